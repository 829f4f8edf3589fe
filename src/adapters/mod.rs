//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements        | Connects to                 |
//! |-------------|-------------------|-----------------------------|
//! | `device_id` | (helper)          | eFuse base MAC              |
//! | `hardware`  | SensorPort        | DHT22, PIR GPIO, soil ADC1  |
//! | `log_sink`  | EventSink         | Serial log output           |
//! | `mqtt`      | SessionTransport  | ESP-IDF MQTT client         |
//! | `time`      | Clock             | ESP32 system timer          |
//! | `wifi`      | LinkDriver        | ESP-IDF WiFi STA            |

pub mod device_id;
pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
