//! BLE GATT profiles exposed by the MKR IoT Carrier firmware
//!
//! Two sketches exist: the sensor/actuator carrier and the alarm clock. Each
//! is described by a static [`Profile`]: its service UUIDs, the names the
//! board may advertise under, and one [`ChannelSpec`] per characteristic.

use std::fmt;

use uuid::Uuid;

use crate::wire::WireType;

/// Sensor carrier primary service: f2c9bbaa-7595-4b33-99e9-0ce1cd1422f9
pub const SENSOR_SERVICE_UUID: Uuid = Uuid::from_u128(0xf2c9bbaa_7595_4b33_99e9_0ce1cd1422f9);

/// Sensor carrier control service: 5f5b4d2a-3b2b-4f8d-a2a7-1a2b3c4d5e6f
pub const CONTROL_SERVICE_UUID: Uuid = Uuid::from_u128(0x5f5b4d2a_3b2b_4f8d_a2a7_1a2b3c4d5e6f);

pub const TEMPERATURE_UUID: Uuid = Uuid::from_u128(0xbcd3a81a_20cc_4e27_be8c_89df34325729);
pub const HUMIDITY_UUID: Uuid = Uuid::from_u128(0x2c394694_e7a4_481c_84c7_60faebe166fd);
pub const PRESSURE_UUID: Uuid = Uuid::from_u128(0xfbdd96a8_e40f_467a_ab5d_15955cf5ded1);
pub const LIGHT_UUID: Uuid = Uuid::from_u128(0x2743dc8f_6162_4b48_b2db_ebfd9faa4075);

pub const COLOR_R_UUID: Uuid = Uuid::from_u128(0x5f5b4d30_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const COLOR_G_UUID: Uuid = Uuid::from_u128(0x5f5b4d31_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const COLOR_B_UUID: Uuid = Uuid::from_u128(0x5f5b4d32_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const GYRO_X_UUID: Uuid = Uuid::from_u128(0x5f5b4d40_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const GYRO_Y_UUID: Uuid = Uuid::from_u128(0x5f5b4d41_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const GYRO_Z_UUID: Uuid = Uuid::from_u128(0x5f5b4d42_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const ACCEL_X_UUID: Uuid = Uuid::from_u128(0x5f5b4d43_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const ACCEL_Y_UUID: Uuid = Uuid::from_u128(0x5f5b4d44_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const ACCEL_Z_UUID: Uuid = Uuid::from_u128(0x5f5b4d45_3b2b_4f8d_a2a7_1a2b3c4d5e6f);

pub const RELAY1_UUID: Uuid = Uuid::from_u128(0x5f5b4d2b_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const RELAY2_UUID: Uuid = Uuid::from_u128(0x5f5b4d2c_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const BUZZER_UUID: Uuid = Uuid::from_u128(0x5f5b4d2d_3b2b_4f8d_a2a7_1a2b3c4d5e6f);
pub const LED_UUID: Uuid = Uuid::from_u128(0x5f5b4d2e_3b2b_4f8d_a2a7_1a2b3c4d5e6f);

/// Alarm clock service: 4e2b8b44-5c1f-4d0e-9a7b-2f6c3d8e1a00
pub const ALARM_SERVICE_UUID: Uuid = Uuid::from_u128(0x4e2b8b44_5c1f_4d0e_9a7b_2f6c3d8e1a00);

pub const ALARM_SWITCH_UUID: Uuid = Uuid::from_u128(0x4e2b8b44_5c1f_4d0e_9a7b_2f6c3d8e1a01);
pub const ALARM_TIME_UUID: Uuid = Uuid::from_u128(0x4e2b8b44_5c1f_4d0e_9a7b_2f6c3d8e1a02);
pub const LOCAL_TIME_UUID: Uuid = Uuid::from_u128(0x4e2b8b44_5c1f_4d0e_9a7b_2f6c3d8e1a03);
pub const MELODY_UUID: Uuid = Uuid::from_u128(0x4e2b8b44_5c1f_4d0e_9a7b_2f6c3d8e1a04);

/// Logical name of a characteristic, independent of its UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
    Light,
    ColorR,
    ColorG,
    ColorB,
    GyroX,
    GyroY,
    GyroZ,
    AccelX,
    AccelY,
    AccelZ,
    Relay1,
    Relay2,
    Buzzer,
    Led,
    AlarmSwitch,
    AlarmTime,
    LocalTime,
    Melody,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::Light => "light",
            Channel::ColorR => "color_r",
            Channel::ColorG => "color_g",
            Channel::ColorB => "color_b",
            Channel::GyroX => "gyro_x",
            Channel::GyroY => "gyro_y",
            Channel::GyroZ => "gyro_z",
            Channel::AccelX => "accel_x",
            Channel::AccelY => "accel_y",
            Channel::AccelZ => "accel_z",
            Channel::Relay1 => "relay1",
            Channel::Relay2 => "relay2",
            Channel::Buzzer => "buzzer",
            Channel::Led => "led",
            Channel::AlarmSwitch => "alarm_switch",
            Channel::AlarmTime => "alarm_time",
            Channel::LocalTime => "local_time",
            Channel::Melody => "melody",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which operations a characteristic supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable, and pushes updates to subscribers
    ReadNotify,
    Write,
    ReadWrite,
}

impl Access {
    pub fn can_read(&self) -> bool {
        matches!(self, Access::ReadNotify | Access::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }

    pub fn notifies(&self) -> bool {
        matches!(self, Access::ReadNotify)
    }
}

/// Which of the profile's services holds a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Primary,
    Control,
}

/// One characteristic of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub channel: Channel,
    pub uuid: Uuid,
    pub service: ServiceRole,
    pub wire: WireType,
    pub access: Access,
}

const fn spec(
    channel: Channel,
    uuid: Uuid,
    service: ServiceRole,
    wire: WireType,
    access: Access,
) -> ChannelSpec {
    ChannelSpec { channel, uuid, service, wire, access }
}

/// Fixed service/characteristic layout of one firmware
#[derive(Debug)]
pub struct Profile {
    pub name: &'static str,
    pub service: Uuid,
    pub control_service: Option<Uuid>,
    /// Exact advertised names accepted during discovery
    pub device_names: &'static [&'static str],
    /// Advertised name prefixes accepted during discovery
    pub device_name_prefixes: &'static [&'static str],
    pub channels: &'static [ChannelSpec],
}

impl Profile {
    pub fn spec(&self, channel: Channel) -> Option<&ChannelSpec> {
        self.channels.iter().find(|s| s.channel == channel)
    }

    /// Service UUID for a role, `None` if the profile has no control service
    pub fn service_uuid(&self, role: ServiceRole) -> Option<Uuid> {
        match role {
            ServiceRole::Primary => Some(self.service),
            ServiceRole::Control => self.control_service,
        }
    }

    /// Channels that push updates; these are subscribed and read at connect time
    pub fn telemetry(&self) -> impl Iterator<Item = &ChannelSpec> {
        self.channels.iter().filter(|s| s.access.notifies())
    }

    /// All service UUIDs the profile needs access to
    pub fn services(&self) -> Vec<Uuid> {
        std::iter::once(self.service).chain(self.control_service).collect()
    }
}

use Access::*;
use ServiceRole::*;

static SENSOR_CHANNELS: [ChannelSpec; 17] = [
    spec(Channel::Temperature, TEMPERATURE_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::Humidity, HUMIDITY_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::Pressure, PRESSURE_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::Light, LIGHT_UUID, Primary, WireType::Int32, ReadNotify),
    spec(Channel::ColorR, COLOR_R_UUID, Primary, WireType::Int32, ReadNotify),
    spec(Channel::ColorG, COLOR_G_UUID, Primary, WireType::Int32, ReadNotify),
    spec(Channel::ColorB, COLOR_B_UUID, Primary, WireType::Int32, ReadNotify),
    spec(Channel::GyroX, GYRO_X_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::GyroY, GYRO_Y_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::GyroZ, GYRO_Z_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::AccelX, ACCEL_X_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::AccelY, ACCEL_Y_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::AccelZ, ACCEL_Z_UUID, Primary, WireType::Float, ReadNotify),
    spec(Channel::Relay1, RELAY1_UUID, Control, WireType::Flag, ReadWrite),
    spec(Channel::Relay2, RELAY2_UUID, Control, WireType::Flag, ReadWrite),
    spec(Channel::Buzzer, BUZZER_UUID, Control, WireType::Int32, Write),
    spec(Channel::Led, LED_UUID, Control, WireType::LedCommand, Write),
];

static ALARM_CHANNELS: [ChannelSpec; 4] = [
    spec(Channel::AlarmSwitch, ALARM_SWITCH_UUID, Primary, WireType::Flag, ReadWrite),
    spec(Channel::AlarmTime, ALARM_TIME_UUID, Primary, WireType::TimePair, ReadWrite),
    spec(Channel::LocalTime, LOCAL_TIME_UUID, Primary, WireType::TimePair, ReadWrite),
    spec(Channel::Melody, MELODY_UUID, Primary, WireType::Text, ReadWrite),
];

/// Sensor/actuator carrier sketch
pub static SENSOR_CARRIER: Profile = Profile {
    name: "sensor",
    service: SENSOR_SERVICE_UUID,
    control_service: Some(CONTROL_SERVICE_UUID),
    device_names: &["Arduino MKR IoT Carrier"],
    device_name_prefixes: &["Arduino"],
    channels: &SENSOR_CHANNELS,
};

/// Alarm clock sketch
pub static ALARM_CLOCK: Profile = Profile {
    name: "alarm",
    service: ALARM_SERVICE_UUID,
    control_service: None,
    device_names: &[],
    device_name_prefixes: &[],
    channels: &ALARM_CHANNELS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sensor_profile_layout() {
        assert_eq!(SENSOR_CARRIER.telemetry().count(), 13);
        let control: Vec<_> = SENSOR_CARRIER
            .channels
            .iter()
            .filter(|s| s.service == ServiceRole::Control)
            .map(|s| s.channel)
            .collect();
        assert_eq!(
            control,
            vec![Channel::Relay1, Channel::Relay2, Channel::Buzzer, Channel::Led]
        );
    }

    #[test]
    fn characteristic_uuids_are_unique() {
        for profile in [&SENSOR_CARRIER, &ALARM_CLOCK] {
            let uuids: HashSet<_> = profile.channels.iter().map(|s| s.uuid).collect();
            assert_eq!(uuids.len(), profile.channels.len(), "{}", profile.name);
        }
    }

    #[test]
    fn alarm_profile_has_no_telemetry() {
        assert_eq!(ALARM_CLOCK.telemetry().count(), 0);
        assert_eq!(ALARM_CLOCK.services(), vec![ALARM_SERVICE_UUID]);
        assert_eq!(
            ALARM_CLOCK.spec(Channel::Melody).map(|s| s.wire),
            Some(WireType::Text)
        );
        assert!(ALARM_CLOCK.spec(Channel::Temperature).is_none());
    }

    #[test]
    fn uuid_constants_match_firmware_strings() {
        assert_eq!(
            SENSOR_SERVICE_UUID.to_string(),
            "f2c9bbaa-7595-4b33-99e9-0ce1cd1422f9"
        );
        assert_eq!(LED_UUID.to_string(), "5f5b4d2e-3b2b-4f8d-a2a7-1a2b3c4d5e6f");
        assert!(ALARM_SERVICE_UUID.to_string().starts_with("4e2b8b44-"));
    }
}
