//! Display rotation and fault-tolerant data acquisition for sunticker.
//!
//! - **[`RotationScheduler`]** cycles through a [`SourceSequence`], showing
//!   each source's label on a [`MatrixDisplay`] and its value on a
//!   [`SegmentDisplay`]. A refresh task keeps the value current; a rotation
//!   task advances after each source's dwell time. [`pause`] holds the
//!   current source; [`apply_brightness_policy`] dims both displays at
//!   night.
//!
//! - **[`InverterSource`]** serves inverter telemetry over a lazily
//!   reconnecting session. Faults become [`Absence`], never errors.
//!
//! - **[`ClimateSource`]** serves local temperature and humidity from a
//!   primary thermometer with a fallback sensor, both probed once at
//!   startup.
//!
//! Both providers implement [`DataProvider`], the only seam the scheduler
//! depends on.
//!
//! [`pause`]: RotationScheduler::pause
//! [`apply_brightness_policy`]: RotationScheduler::apply_brightness_policy

pub mod brightness;
pub mod climate;
pub mod display;
pub mod error;
pub mod inverter;
pub mod provider;
pub mod reading;
pub mod scheduler;
pub mod source;

// ── Primary re-exports ──────────────────────────────────────────────
pub use brightness::{BrightnessPolicy, Clock, SystemClock};
pub use climate::{
    ClimateSample, ClimateSensor, ClimateSource, HUMIDITY_KEY, IioClimateSensor, SensorPresence,
    TEMPERATURE_KEY, Thermometer, W1Thermometer,
};
pub use display::{
    Brightness, DIGITS_PER_MODULE, DisplayError, MatrixDisplay, NO_DATA, SegmentDisplay,
    SegmentValue, format_segment,
};
pub use error::CoreError;
pub use inverter::{ConnectionState, InverterSource, TelemetryBackend};
pub use provider::DataProvider;
pub use reading::{Absence, FaultClass, Measurement, Reading};
pub use scheduler::{RotationScheduler, SchedulerConfig, SchedulerParts};
pub use source::{SourceDescriptor, SourceSequence};
