//! One-shot hardware peripheral initialization.
//!
//! Configures the ADC1 oneshot unit for the soil probe and the PIR input
//! using raw ESP-IDF sys calls. Called once from `main()` before the
//! control loop starts. The DHT22 line is owned by its own pin driver and
//! is not touched here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::config::{NodeConfig, PinAssignment};
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    /// The configured soil GPIO has no ADC1 channel.
    NotAnAdcPin(i32),
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAnAdcPin(gpio) => write!(f, "GPIO{} is not an ADC1 pin", gpio),
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

/// ADC1 channel for the soil probe, checked against the pin map.
pub fn soil_channel(pins: &PinAssignment) -> Result<u32, HwInitError> {
    pins::adc1_channel(pins.soil_adc_gpio).ok_or(HwInitError::NotAnAdcPin(pins.soil_adc_gpio))
}

/// Boot gate: validate the configuration, then bring up the ADC and PIR
/// input. Returns the soil ADC1 channel.
pub fn bring_up(config: &NodeConfig) -> crate::error::Result<u32> {
    config.validate()?;
    init_peripherals(&config.pins)?;
    Ok(soil_channel(&config.pins)?)
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(pins: &PinAssignment) -> Result<(), HwInitError> {
    let channel = soil_channel(pins)?;
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc(channel, pins.adc_resolution_bits)?;
        init_motion_input(pins.motion_gpio)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(pins: &PinAssignment) -> Result<(), HwInitError> {
    soil_channel(pins)?;
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc(channel: u32, bits: u8) -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // adc_bitwidth_t values equal their bit count (9..=12).
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t::from(bits),
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 CH{} configured ({}-bit, soil)", channel, bits);
    Ok(())
}

/// Raw ADC1 count, 0 on a failed conversion.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.clamp(0, i32::from(u16::MAX)) as u16
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_motion_input(gpio: i32) -> Result<(), HwInitError> {
    // HC-SR501 drives its output push-pull; the pull-down only holds the
    // line low while the module is unpowered.
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << gpio,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: GPIO{} configured as motion input", gpio);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}
