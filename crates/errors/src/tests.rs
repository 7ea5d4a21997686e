use crate::*;

#[test]
fn test_sim_error_display() {
    let err = SimError::no_instances("billing");
    assert_eq!(err.to_string(), "服务没有可用实例: billing");

    let err = SimError::unknown_correlation_id("42");
    assert_eq!(err.to_string(), "未知的关联ID: 42");

    let err = SimError::transport("connection refused");
    assert_eq!(err.to_string(), "传输错误: connection refused");

    let err = SimError::DispatcherUnavailable;
    assert_eq!(err.to_string(), "调度循环不再接收请求");
}

#[test]
fn test_unprocessable_classification() {
    assert!(SimError::malformed("bad json").is_unprocessable());
    assert!(SimError::unknown_correlation_id("7").is_unprocessable());
    assert!(!SimError::discovery("etcd down").is_unprocessable());
    assert!(!SimError::DispatcherUnavailable.is_unprocessable());
}

#[test]
fn test_fatal_classification() {
    assert!(SimError::config_error("missing name").is_fatal());
    assert!(SimError::Internal("boom".to_string()).is_fatal());
    assert!(!SimError::no_instances("a").is_fatal());
}

#[test]
fn test_from_serde_json_error() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: SimError = parse_err.into();
    assert!(matches!(err, SimError::Serialization(_)));
}
