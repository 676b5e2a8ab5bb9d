use strum_macros::{Display, EnumString};

/// What assigning to a property an object doesn't have yet does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum FieldPolicy {
    #[strum(serialize = "create")]
    Create,
    #[strum(serialize = "update-only")]
    UpdateOnly,
}

impl Default for FieldPolicy {
    fn default() -> FieldPolicy {
        FieldPolicy::Create
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub field_policy: FieldPolicy,
    pub report_warnings: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            field_policy: FieldPolicy::default(),
            report_warnings: true,
        }
    }
}
