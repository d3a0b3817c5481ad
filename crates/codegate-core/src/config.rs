/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize`, set [`Config::PREFIX`] and call
/// `Config::from_env()` at startup. Field `http_port` is read from
/// `<PREFIX>HTTP_PORT`, and so on.
pub trait Config: Sized + serde::de::DeserializeOwned {
    /// Environment variable prefix, e.g. `"CODEGATE_"`.
    const PREFIX: &'static str;

    fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(Self::PREFIX).from_env()
    }

    /// Same as [`Config::from_env`] but reads from an explicit iterator of
    /// `(key, value)` pairs. Keys still carry the prefix.
    fn from_iter<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(Self::PREFIX).from_iter(vars)
    }
}
