use crate::registers::Register;
use std::borrow::Cow;

/// A register value as reported by the vendor.
///
/// The local IAM module reports the Modbus integer codes, while the SAVE Connect cloud reports
/// enumerations by their lower-case names (`"active"`, `"normal"`, ...).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Integer(i64),
    Text(String),
}

impl RegisterValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RegisterValue::Integer(n) => Some(*n),
            RegisterValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RegisterValue::Integer(n) => Cow::Owned(n.to_string()),
            RegisterValue::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl std::fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<i64> for RegisterValue {
    fn from(value: i64) -> Self {
        RegisterValue::Integer(value)
    }
}

impl From<&str> for RegisterValue {
    fn from(value: &str) -> Self {
        RegisterValue::Text(value.to_string())
    }
}

impl From<String> for RegisterValue {
    fn from(value: String) -> Self {
        RegisterValue::Text(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegisterMetadata {
    /// Which physical board the value belongs to: 1 is the main board, 2 is the IAM module.
    #[serde(rename = "internalDeviceType", default)]
    pub internal_device_type: Option<u8>,
}

/// A single register change event.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegisterUpdate {
    pub register: String,
    pub value: RegisterValue,
    #[serde(default)]
    pub metadata: RegisterMetadata,
}

impl RegisterUpdate {
    pub fn new(register: Register, value: impl Into<RegisterValue>) -> Self {
        Self {
            register: register.name().to_string(),
            value: value.into(),
            metadata: RegisterMetadata::default(),
        }
    }

    pub fn with_device_type(mut self, device_type: u8) -> Self {
        self.metadata.internal_device_type = Some(device_type);
        self
    }

    /// The register, if it is one this bridge knows about.
    pub fn known_register(&self) -> Option<Register> {
        Register::from_name(&self.register)
    }
}

/// Implements `TryFrom<&RegisterValue>` for a `#[repr(u8)]` vendor enumeration that derives
/// `strum::FromRepr` and `strum::EnumString`.
macro_rules! vendor_enum_from_value {
    ($ty: ty) => {
        impl TryFrom<&$crate::value::RegisterValue> for $ty {
            type Error = ();
            fn try_from(value: &$crate::value::RegisterValue) -> Result<Self, Self::Error> {
                if let Some(code) = value.as_integer() {
                    let code = u8::try_from(code).map_err(|_| ())?;
                    return Self::from_repr(code).ok_or(());
                }
                value.as_text().trim().parse::<Self>().map_err(|_| ())
            }
        }
    };
}

pub(crate) use vendor_enum_from_value;
