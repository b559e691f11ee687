//! Echo handler registered on the server's router.

use super::Echo;
use crate::rpc::Router;

/// Method name of the echo operation.
pub const METHOD: &str = "Echo.Echo";

/// Return the payload unchanged.
pub fn echo(args: Echo) -> Echo {
    args
}

/// Add the echo operation to `router`.
pub fn register(router: Router) -> Router {
    router.route(METHOD, echo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Request;
    use serde_json::json;

    #[test]
    fn test_echo_is_identity() {
        let args = Echo {
            timestamp: 1_700_000_000_123_456_789,
        };
        assert_eq!(echo(args), args);
    }

    #[test]
    fn test_registered_under_method_name() {
        let router = register(Router::new());
        assert!(router.contains(METHOD));

        let rsp = router.dispatch(Request {
            id: 9,
            method: METHOD.to_string(),
            params: json!({"timestamp": -42}),
        });
        assert_eq!(rsp.result, Some(json!({"timestamp": -42})));
    }
}
