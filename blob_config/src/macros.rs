/// Looks up a configuration variable by its primary name, then by any alias registered in
/// [`ENVIRONMENT_NAME_ALIASES`](crate::ENVIRONMENT_NAME_ALIASES).
pub fn lookup_env_with_aliases(primary_name: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(v) = lookup(primary_name) {
        return Some(v);
    }

    crate::ENVIRONMENT_NAME_ALIASES
        .iter()
        .filter(|(primary, _)| *primary == primary_name)
        .find_map(|(_, alias)| lookup(alias))
}

/// Macro to create a configuration value group struct.
///
/// Usage:
/// ```rust
/// mod example {
///     blob_config::config_group!({
///         ref test_int: usize = 42;
///         ref test_string: String = "default".to_string();
///     });
/// }
/// ```
///
/// This creates a `ConfigValueGroup` struct with the specified fields.  Environment overrides are
/// named `BLOBRS_{MODULE}_{FIELD}`, where `MODULE` is the last segment of the module path the macro
/// is invoked in, so the `test_int` field above is set with `BLOBRS_EXAMPLE_TEST_INT`.
#[macro_export]
macro_rules! config_group {
    ({
        $(
            $(#[$meta:meta])*
            ref $name:ident : $type:ty = $value:expr;
        )+
    }) => {
        #[allow(unused_imports)]
        use $crate::ParsableConfigValue;

        /// ConfigValueGroup struct containing all configurable values
        #[derive(Debug, Clone)]
        pub struct ConfigValueGroup {
            $(
                $(#[$meta])*
                pub $name: $type,
            )+
        }

        impl Default for ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            fn default() -> Self {
                Self {
                    $(
                        $name: {
                            let v: $type = $value;
                            v
                        },
                    )+
                }
            }
        }

        impl ConfigValueGroup {
            pub fn new() -> Self {
                Self::default()
            }

            /// The environment variable names for each field, in declaration order.
            pub fn env_var_names() -> &'static [&'static str] {
                const NAMES: &[&str] = &[
                    $(
                        $crate::const_str::concat!(
                            "BLOBRS_",
                            $crate::const_str::convert_ascii_case!(upper, $crate::konst::string::rsplit_once(module_path!(), "::").unwrap().1),
                            "_",
                            $crate::const_str::convert_ascii_case!(upper, stringify!($name))),
                    )+
                ];
                NAMES
            }

            /// Apply environment variable overrides to this configuration group.
            pub fn apply_env_overrides(&mut self) {
                self.apply_overrides_from(&|name| std::env::var(name).ok());
            }

            /// Apply overrides from an arbitrary variable source; unset variables keep their default.
            pub fn apply_overrides_from(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
                $(
                    {
                        const ENV_VAR_NAME: &str = $crate::const_str::concat!(
                            "BLOBRS_",
                            $crate::const_str::convert_ascii_case!(upper, $crate::konst::string::rsplit_once(module_path!(), "::").unwrap().1),
                            "_",
                            $crate::const_str::convert_ascii_case!(upper, stringify!($name)));

                        let maybe_value = $crate::macros::lookup_env_with_aliases(ENV_VAR_NAME, lookup);
                        let default_value: $type = $value;
                        self.$name = <$type>::parse(ENV_VAR_NAME, maybe_value, default_value);
                    }
                )+
            }
        }

        /// Type alias for easier reference in config aggregation.
        pub type ConfigValues = ConfigValueGroup;
    };
}
