pub mod types;
pub mod utils;
pub mod env;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_type_ok() {
        let h = types::Health { status: "ok" };
        assert_eq!(h.status, "ok");
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"status":"ok"}"#);
    }
}
