//! Peer presence
//!
//! The router announces joins on `wamp.session.on_join` and leaves on
//! `wamp.session.on_leave`. Robots that joined before the console did are
//! found by [`reconcile`].

use serde_json::{json, Map, Value};

use crate::router::RemoteCaller;
use crate::target::TargetRegistry;

pub const ON_JOIN: &str = "wamp.session.on_join";
pub const ON_LEAVE: &str = "wamp.session.on_leave";
const SESSION_LIST: &str = "wamp.session.list";
const SESSION_GET: &str = "wamp.session.get";

/// Session details as the router publishes them
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNotice {
    pub session: u64,
    pub authid: String,
    /// `transport.peer`, when the router reports it
    pub address: Option<String>,
}

impl JoinNotice {
    pub fn from_details(details: &Map<String, Value>) -> Option<Self> {
        let session = details.get("session").and_then(Value::as_u64)?;
        let authid = details.get("authid").and_then(Value::as_str)?.to_string();
        let address = details
            .get("transport")
            .and_then(|t| t.get("peer"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            session,
            authid,
            address,
        })
    }

    /// Parse the positional arguments of an `on_join` event
    pub fn from_event(args: &[Value]) -> Option<Self> {
        args.first()
            .and_then(Value::as_object)
            .and_then(Self::from_details)
    }

    /// Apply to the registry; returns the matching target id
    pub fn apply(&self, registry: &TargetRegistry) -> Option<String> {
        registry.mark_joined(&self.authid, self.session, self.address.clone())
    }
}

/// Session id carried by an `on_leave` event
pub fn leave_session(args: &[Value]) -> Option<u64> {
    args.first().and_then(Value::as_u64)
}

/// Match every currently joined session against the registry
///
/// Returns the ids of the targets found online. A failed session listing
/// is an error; a session that vanishes before it can be inspected is
/// skipped.
pub async fn reconcile(
    caller: &dyn RemoteCaller,
    registry: &TargetRegistry,
) -> phi_wamp::Result<Vec<String>> {
    let listing = caller.call(SESSION_LIST, Vec::new()).await?.value();
    let sessions: Vec<u64> = listing
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default();

    let mut found = Vec::new();
    for session in sessions {
        let details = match caller.call(SESSION_GET, vec![json!(session)]).await {
            Ok(result) => result.value(),
            Err(e) => {
                tracing::debug!(session_id = session, error = %e, "Session vanished during reconciliation");
                continue;
            }
        };

        let notice = details.as_object().and_then(JoinNotice::from_details);
        if let Some(target) = notice.and_then(|n| n.apply(registry)) {
            found.push(target);
        }
    }

    tracing::info!(sessions = found.len(), "Reconciled joined robots");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingCaller;

    #[test]
    fn test_join_notice() {
        let args = vec![json!({
            "session": 4411,
            "authid": "DOG-4S1",
            "authrole": "dog",
            "transport": {"type": "websocket", "peer": "tcp4:192.168.193.20:40112"}
        })];

        let notice = JoinNotice::from_event(&args).unwrap();
        assert_eq!(notice.session, 4411);
        assert_eq!(notice.authid, "DOG-4S1");
        assert_eq!(notice.address.as_deref(), Some("tcp4:192.168.193.20:40112"));

        let registry = TargetRegistry::with_defaults();
        assert_eq!(notice.apply(&registry).as_deref(), Some("pack2"));
        assert!(registry.is_connected("pack2"));

        assert!(JoinNotice::from_event(&[json!("garbage")]).is_none());
        assert!(JoinNotice::from_event(&[]).is_none());
    }

    #[test]
    fn test_leave_session() {
        assert_eq!(leave_session(&[json!(4411)]), Some(4411));
        assert_eq!(leave_session(&[]), None);
    }

    #[tokio::test]
    async fn test_reconcile_matches_authids() {
        let caller = RecordingCaller::new();
        caller.returns(json!([10, 11, 12]));
        caller.returns(json!({"session": 10, "authid": "Zeus"}));
        caller.returns(json!({"session": 11, "authid": "DOG-1E5"}));
        caller.fails("wamp.error.no_such_session", "no session with ID 12 exists");

        let registry = TargetRegistry::with_defaults();
        let found = reconcile(&caller, &registry).await.unwrap();

        assert_eq!(found, vec!["pack1"]);
        assert!(registry.is_connected("pack1"));
        assert_eq!(registry.get("pack1").unwrap().session, Some(11));
        assert!(!registry.is_connected("pack2"));
        assert_eq!(
            caller.procedures_called(),
            vec![
                "wamp.session.list",
                "wamp.session.get",
                "wamp.session.get",
                "wamp.session.get"
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_listing_failure() {
        let caller = RecordingCaller::new();
        caller.fails("wamp.error.not_authorized", "not authorized");

        let registry = TargetRegistry::with_defaults();
        assert!(reconcile(&caller, &registry).await.is_err());
    }
}
