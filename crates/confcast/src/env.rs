use crate::client::ClientError;
use crate::handler::Handler;
use crate::value::{Kind, Value};
use async_trait::async_trait;

/// Handler over the operating-system environment.
///
/// Hits are raw text, so this handler asserts its values.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEnv;

impl OsEnv {
    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    /// Export a text value into the process environment.
    pub fn set(&self, key: &str, value: &Value) -> Result<(), ClientError> {
        match value {
            Value::Text(s) => {
                std::env::set_var(key, s);
                Ok(())
            }
            _ => Err(ClientError::Invalid),
        }
    }
}

#[async_trait]
impl Handler for OsEnv {
    async fn lookup(&self, key: &str) -> Option<Value> {
        std::env::var(key).ok().map(Value::Text)
    }

    fn assert(&self, value: Value, kind: Kind) -> Option<Value> {
        value.coerce(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_assert() {
        std::env::set_var("CONFCAST_TEST_PORT", "8080");

        let env = OsEnv;
        let raw = env.lookup("CONFCAST_TEST_PORT").await.unwrap();
        assert_eq!(raw, Value::Text("8080".to_string()));
        assert_eq!(env.assert(raw, Kind::Int), Some(Value::Int(8080)));

        assert_eq!(env.lookup("CONFCAST_TEST_ABSENT").await, None);
    }

    #[tokio::test]
    async fn test_set_rejects_non_text() {
        let env = OsEnv;
        assert_eq!(env.set("CONFCAST_TEST_B", &Value::Bool(true)), Err(ClientError::Invalid));
        env.set("CONFCAST_TEST_B", &Value::Text("on".to_string()))
            .unwrap();
        assert_eq!(env.get("CONFCAST_TEST_B").as_deref(), Some("on"));
    }
}
