fn main() {
    // Build-time node configuration, read through `option_env!` in config.rs.
    for var in [
        "ENVNODE_WIFI_SSID",
        "ENVNODE_WIFI_PASS",
        "ENVNODE_MQTT_HOST",
        "ENVNODE_MQTT_PORT",
        "ENVNODE_MQTT_USER",
        "ENVNODE_MQTT_PASS",
        "ENVNODE_BASE_TOPIC",
        "ENVNODE_NODE_ID",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
