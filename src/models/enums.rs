use serde::{Deserialize, Serialize};

/// Rejected string form of one of the enums below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(CaptureOrigin {
    Camera => "camera",
    Gallery => "gallery",
});

str_enum!(PermissionKind {
    Camera => "camera",
    Gallery => "gallery",
    Location => "location",
});

str_enum!(QualityLabel {
    Good => "good",
    Poor => "poor",
});

str_enum!(Language {
    English => "en",
    Hindi => "hi",
    Tamil => "ta",
    Malayalam => "ml",
    Kannada => "kn",
    Telugu => "te",
    Assamese => "as",
});

str_enum!(TemperatureUnit {
    Metric => "metric",
    Imperial => "imperial",
    Standard => "standard",
});

impl Language {
    pub const ALL: [Language; 7] = [
        Self::English,
        Self::Hindi,
        Self::Tamil,
        Self::Malayalam,
        Self::Kannada,
        Self::Telugu,
        Self::Assamese,
    ];

    /// Name of the language in its own script, as shown on the picker.
    pub fn native_label(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "हिन्दी",
            Self::Tamil => "தமிழ்",
            Self::Malayalam => "മലയാളം",
            Self::Kannada => "ಕನ್ನಡ",
            Self::Telugu => "తెలుగు",
            Self::Assamese => "অসমীয়া",
        }
    }
}

/// One row of the language picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageOption {
    pub code: Language,
    pub label: &'static str,
}

impl Language {
    /// Picker rows in display order.
    pub fn options() -> Vec<LanguageOption> {
        Self::ALL
            .iter()
            .map(|&code| LanguageOption {
                code,
                label: code.native_label(),
            })
            .collect()
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::English
    }
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Metric => "C",
            Self::Imperial => "F",
            Self::Standard => "K",
        }
    }

    /// Picker label to unit ("Celsius" → metric).
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Celsius" => Some(Self::Metric),
            "Fahrenheit" => Some(Self::Imperial),
            "Kelvin" => Some(Self::Standard),
            _ => None,
        }
    }

    /// Unit from the weather screen: a wire string, a picker label, or
    /// nothing for the metric default.
    pub fn from_choice(choice: Option<&str>) -> Result<Self, InvalidEnum> {
        match choice {
            None => Ok(Self::default()),
            Some(choice) => Self::from_label(choice)
                .map(Ok)
                .unwrap_or_else(|| choice.parse()),
        }
    }
}

impl Default for TemperatureUnit {
    fn default() -> Self {
        Self::Metric
    }
}
