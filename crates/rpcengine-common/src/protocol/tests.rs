//! Integration tests for the protocol module
//!
//! These tests verify message classification, id handling and the
//! request/response constructors.

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_request_creation() {
        let req = Request::call(Id::Number(1), "add", Some(json!([1, 2])));
        assert_eq!(req.method, "add");
        assert_eq!(req.id, Some(Id::Number(1)));
        assert!(!req.is_notification());
        assert_eq!(req.jsonrpc.as_deref(), Some(JSONRPC_VERSION));
    }

    #[test]
    fn test_notification_has_no_id_on_the_wire() {
        let note = Request::notification("event", Some(json!([42])));
        assert!(note.is_notification());
        assert_eq!(
            note.to_value(),
            json!({"jsonrpc": "2.0", "method": "event", "params": [42]})
        );
    }

    #[test]
    fn test_request_without_params_omits_them() {
        let req = Request::call(Id::from("abc"), "hello", None);
        assert_eq!(req.to_value(), json!({"jsonrpc": "2.0", "id": "abc", "method": "hello"}));
    }

    #[test]
    fn test_positional_params() {
        let mut req = Request::notification("m", Some(json!([1, "two"])));
        assert_eq!(req.positional_params(), vec![json!(1), json!("two")]);

        req.params = Some(json!({"question": "universe"}));
        assert_eq!(req.positional_params(), vec![json!({"question": "universe"})]);

        req.params = None;
        assert!(req.positional_params().is_empty());
    }

    #[test]
    fn test_success_response_drops_null_result() {
        let res = Response::success(Id::Number(3), json!(null));
        assert_eq!(res.to_value(), json!({"jsonrpc": "2.0", "id": 3}));
        assert_eq!(res.into_outcome(), Ok(json!(null)));
    }

    #[test]
    fn test_error_response_outcome() {
        let res = Response::error(Id::Number(3), RpcError::method_not_found("bogus"));
        let err = res.into_outcome().unwrap_err();
        assert_eq!(err.code, Some(METHOD_NOT_FOUND));
    }

    #[test]
    fn test_classify_request() {
        let msg = Message::classify(json!({"id": 1, "method": "add", "params": [1, 2]})).unwrap();
        match msg {
            Message::Request(req) => {
                assert_eq!(req.id, Some(Id::Number(1)));
                assert_eq!(req.params, Some(json!([1, 2])));
                assert!(req.jsonrpc.is_none());
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_null_id_is_notification() {
        let msg = Message::classify(json!({"id": null, "method": "tick"})).unwrap();
        assert!(matches!(msg, Message::Request(ref r) if r.is_notification()));
        assert_eq!(msg.id(), None);
    }

    #[test]
    fn test_classify_response() {
        let msg = Message::classify(json!({"id": "x1", "result": 1337})).unwrap();
        assert_eq!(
            msg,
            Message::Response(Response {
                jsonrpc: None,
                id: Id::from("x1"),
                result: Some(json!(1337)),
                error: None,
            })
        );
    }

    #[test]
    fn test_classify_void_response() {
        let msg = Message::classify(json!({"id": 9})).unwrap();
        match msg {
            Message::Response(res) => assert_eq!(res.into_outcome(), Ok(json!(null))),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_wins_over_result() {
        let msg = Message::classify(json!({
            "id": 2,
            "result": 1,
            "error": {"message": "nope", "code": -1}
        }))
        .unwrap();
        match msg {
            Message::Response(res) => {
                assert!(res.result.is_none());
                assert_eq!(res.error.unwrap().message, "nope");
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_malformed_error_still_rejects() {
        let outcome = |raw: Value| match Message::classify(raw).unwrap() {
            Message::Response(res) => res.into_outcome(),
            other => panic!("expected response, got {:?}", other),
        };

        let err = outcome(json!({"id": 4, "error": "boom"})).unwrap_err();
        assert_eq!(err.message, "boom");
        assert_eq!(err.code, None);

        let err = outcome(json!({"id": 5, "error": {"code": 7}})).unwrap_err();
        assert_eq!(err.code, Some(INVALID_REQUEST));
        assert_eq!(err.data, Some(json!({"code": 7})));
    }

    #[test]
    fn test_classify_error_without_id_is_invalid() {
        let raw = json!({"error": {"message": "parse error", "code": -32700}});
        let invalid = Message::classify(raw.clone()).unwrap_err();
        assert_eq!(invalid.raw, raw);
        assert!(invalid.id.is_none());
        assert!(!invalid.request_shaped);

        let err = invalid.to_error();
        assert_eq!(err.code, Some(INVALID_REQUEST));
        assert_eq!(err.data.unwrap()["error"]["code"], -32700);
    }

    #[test]
    fn test_classify_rejects_non_objects() {
        assert!(Message::classify(json!([1, 2, 3])).is_err());
        assert!(Message::classify(json!("hello")).is_err());
        assert!(Message::classify(json!({})).is_err());
    }

    #[test]
    fn test_classify_bad_request_keeps_id() {
        let invalid = Message::classify(json!({"id": 5, "method": 12})).unwrap_err();
        assert!(invalid.request_shaped);
        assert_eq!(invalid.id, Some(Id::Number(5)));

        let invalid = Message::classify(json!({"id": 6, "method": "m", "params": 3})).unwrap_err();
        assert_eq!(invalid.id, Some(Id::Number(6)));
    }

    #[test]
    fn test_classify_unusable_id() {
        let invalid = Message::classify(json!({"id": 1.5, "result": 1})).unwrap_err();
        assert!(invalid.id.is_none());

        let invalid = Message::classify(json!({"id": [1], "method": "m"})).unwrap_err();
        assert!(invalid.id.is_none());
        assert!(invalid.request_shaped);
    }

    #[test]
    fn test_classify_malformed_error_object() {
        let invalid = Message::classify(json!({"id": 4, "error": "boom"})).unwrap_err();
        assert_eq!(invalid.id, Some(Id::Number(4)));
        assert_eq!(invalid.reason, "malformed error object");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(Id::Number(12).to_string(), "12");
        assert_eq!(Id::from("a").to_string(), "\"a\"");
    }
}
