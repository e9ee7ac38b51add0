use crate::api::models::NotificationPayload;
use crate::shell::navigation::NavigationTarget;

/// Where a notification leads, before any network lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Go(NavigationTarget),
    /// Message notification naming only the peer; the thread has to be
    /// resolved (and maybe created) first.
    ResolveThread { peer_id: i64 },
}

pub fn route(payload: &NotificationPayload) -> Route {
    use NavigationTarget as Nav;
    let target = match payload {
        NotificationPayload::Message {
            thread_id: Some(thread),
            ..
        } => Nav::Thread(*thread),
        NotificationPayload::Message {
            peer_id: Some(peer_id),
            ..
        } => return Route::ResolveThread { peer_id: *peer_id },
        NotificationPayload::Message { .. } => Nav::Messages,

        NotificationPayload::Proposal {
            proposal_id: Some(id),
            ..
        } => Nav::Proposal(*id),
        NotificationPayload::Proposal {
            project_id: Some(id),
            ..
        } => Nav::Project(*id),
        NotificationPayload::Proposal { .. } => Nav::Proposals,

        NotificationPayload::JobApplication {
            job_id: Some(job_id),
            application_id,
        } => Nav::Job {
            job_id: *job_id,
            application_id: *application_id,
        },
        NotificationPayload::JobApplication { .. } => Nav::Jobs,

        NotificationPayload::Contract {
            contract_id: Some(id),
            ..
        } => Nav::Contract(*id),
        NotificationPayload::Contract { .. } => Nav::Contracts,

        NotificationPayload::Workspace {
            workspace_id: Some(id),
            ..
        }
        | NotificationPayload::Payment {
            workspace_id: Some(id),
        } => Nav::Workspace(*id),
        NotificationPayload::Workspace { .. } | NotificationPayload::Payment { .. } => {
            Nav::Workspaces
        }

        NotificationPayload::Unrecognized { .. } => Nav::Notifications,
    };
    Route::Go(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use NavigationTarget as Nav;

    fn go(payload: NotificationPayload) -> NavigationTarget {
        match route(&payload) {
            Route::Go(target) => target,
            other => panic!("expected direct navigation, got {:?}", other),
        }
    }

    #[test]
    fn message_prefers_thread_then_peer() {
        assert_eq!(
            go(NotificationPayload::Message {
                thread_id: Some(5),
                peer_id: Some(8),
                sender_name: None
            }),
            Nav::Thread(5)
        );
        assert_eq!(
            route(&NotificationPayload::Message {
                thread_id: None,
                peer_id: Some(8),
                sender_name: None
            }),
            Route::ResolveThread { peer_id: 8 }
        );
        assert_eq!(
            go(NotificationPayload::Message {
                thread_id: None,
                peer_id: None,
                sender_name: None
            }),
            Nav::Messages
        );
    }

    #[test]
    fn proposal_falls_back_to_project_then_list() {
        assert_eq!(
            go(NotificationPayload::Proposal {
                proposal_id: Some(1),
                project_id: Some(2)
            }),
            Nav::Proposal(1)
        );
        assert_eq!(
            go(NotificationPayload::Proposal {
                proposal_id: None,
                project_id: Some(2)
            }),
            Nav::Project(2)
        );
        assert_eq!(
            go(NotificationPayload::Proposal {
                proposal_id: None,
                project_id: None
            }),
            Nav::Proposals
        );
    }

    #[test]
    fn job_application_carries_application_context() {
        assert_eq!(
            go(NotificationPayload::JobApplication {
                job_id: Some(3),
                application_id: Some(11)
            }),
            Nav::Job {
                job_id: 3,
                application_id: Some(11)
            }
        );
        assert_eq!(
            go(NotificationPayload::JobApplication {
                job_id: None,
                application_id: Some(11)
            }),
            Nav::Jobs
        );
    }

    #[test]
    fn contract_workspace_payment() {
        assert_eq!(
            go(NotificationPayload::Contract {
                contract_id: Some(4),
                project_id: None
            }),
            Nav::Contract(4)
        );
        assert_eq!(
            go(NotificationPayload::Contract {
                contract_id: None,
                project_id: Some(1)
            }),
            Nav::Contracts
        );
        assert_eq!(
            go(NotificationPayload::Workspace {
                workspace_id: Some(6),
                contract_id: Some(4)
            }),
            Nav::Workspace(6)
        );
        assert_eq!(
            go(NotificationPayload::Payment { workspace_id: Some(6) }),
            Nav::Workspace(6)
        );
        assert_eq!(
            go(NotificationPayload::Payment { workspace_id: None }),
            Nav::Workspaces
        );
    }

    #[test]
    fn unknown_types_land_on_notifications() {
        for kind in ["system", "review", ""] {
            assert_eq!(
                go(NotificationPayload::Unrecognized { kind: kind.into() }),
                Nav::Notifications
            );
        }
    }
}
