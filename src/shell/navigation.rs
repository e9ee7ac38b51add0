use log::info;
use std::fmt;

/// Places the client can send the user to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    SignIn,
    Thread(i64),
    Messages,
    Proposal(i64),
    Project(i64),
    Proposals,
    Job {
        job_id: i64,
        application_id: Option<i64>,
    },
    Jobs,
    Contract(i64),
    Contracts,
    Workspace(i64),
    Workspaces,
    Notifications,
}

impl NavigationTarget {
    pub fn path(&self) -> String {
        match self {
            NavigationTarget::SignIn => "/signin".into(),
            NavigationTarget::Thread(id) => format!("/messages/{}", id),
            NavigationTarget::Messages => "/messages".into(),
            NavigationTarget::Proposal(id) => format!("/proposals/{}", id),
            NavigationTarget::Project(id) => format!("/projects/{}", id),
            NavigationTarget::Proposals => "/proposals".into(),
            NavigationTarget::Job {
                job_id,
                application_id: Some(app),
            } => format!("/jobs/{}?application={}", job_id, app),
            NavigationTarget::Job { job_id, .. } => format!("/jobs/{}", job_id),
            NavigationTarget::Jobs => "/jobs".into(),
            NavigationTarget::Contract(id) => format!("/contracts/{}", id),
            NavigationTarget::Contracts => "/contracts".into(),
            NavigationTarget::Workspace(id) => format!("/workspace/{}", id),
            NavigationTarget::Workspaces => "/workspace".into(),
            NavigationTarget::Notifications => "/notifications".into(),
        }
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Router seam owned by whatever renders the client.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &NavigationTarget);
}

/// Logs the route; used by the command-line shell.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, target: &NavigationTarget) {
        info!("navigate to {}", target);
    }
}
