//!
//! Waits for a revision to reach a running state.
//!
//! The loop itself is dumb: every iteration reads the revision, classifies its running
//! state with [`RevisionRunningState::convergence`], reports replica counts and sleeps.
use super::{ContainerAppService, Progress};
use crate::clock::{sleep_or_cancel, Clock};
use crate::factory::{AppScope, ReplicasClient, RevisionsClient};
use crate::types::{Convergence, Replica, Revision, RevisionRunningState};
use crate::{Error, Result, ResultExt};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// First message, and prefix of every replica status line
pub const STATUS_PREFIX: &str = "Waiting for revision to be ready";

const INITIAL_POLL_DELAY: Duration = Duration::from_secs(3);
const POLL_DELAY: Duration = Duration::from_secs(10);
const INITIAL_POLLS: u32 = 20;

const TROUBLESHOOTING_URL: &str = "https://learn.microsoft.com/azure/container-apps/troubleshooting";

/// Delay after the `iteration`th poll, counting from 1
#[must_use]
pub fn poll_delay(iteration: u32) -> Duration {
    if iteration <= INITIAL_POLLS {
        INITIAL_POLL_DELAY
    } else {
        POLL_DELAY
    }
}

/// Where the poller reads revision and replica state from
#[async_trait]
pub trait RevisionStatusSource: Send + Sync {
    /// Current state of the revision
    async fn revision(&self, cancel: &CancellationToken, revision_name: &str) -> Result<Revision>;
    /// Current replicas of the revision
    async fn replicas(
        &self,
        cancel: &CancellationToken,
        revision_name: &str,
    ) -> Result<Vec<Replica>>;
}

/// [`RevisionStatusSource`] backed by the control plane
#[derive(Clone, Debug)]
pub struct RevisionStatusClient {
    revisions: RevisionsClient,
    replicas: ReplicasClient,
}

impl RevisionStatusClient {
    /// Combine the revision and replica clients of one app
    #[must_use]
    pub fn new(revisions: RevisionsClient, replicas: ReplicasClient) -> Self {
        Self {
            revisions,
            replicas,
        }
    }
}

#[async_trait]
impl RevisionStatusSource for RevisionStatusClient {
    async fn revision(&self, cancel: &CancellationToken, revision_name: &str) -> Result<Revision> {
        self.revisions.get_revision(cancel, revision_name).await
    }

    async fn replicas(
        &self,
        cancel: &CancellationToken,
        revision_name: &str,
    ) -> Result<Vec<Replica>> {
        self.replicas.list_replicas(cancel, revision_name).await
    }
}

/// Replica counts of one poll
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicaSummary {
    pub running: usize,
    pub ready: usize,
    pub total: usize,
}

impl ReplicaSummary {
    #[must_use]
    pub fn from_replicas(replicas: &[Replica]) -> Self {
        Self {
            running: replicas.iter().filter(|r| r.is_running()).count(),
            ready: replicas.iter().filter(|r| r.is_ready()).count(),
            total: replicas.len(),
        }
    }

    #[must_use]
    pub fn status_line(&self, prefix: &str) -> String {
        format!(
            "{prefix}: {}/{} replicas running, {}/{} replicas ready",
            self.running, self.total, self.ready, self.total
        )
    }
}

/// Builds the "how to investigate" text attached to revision failures
#[derive(Clone, Debug)]
pub struct Remediation {
    portal_url: String,
    demo_mode: bool,
}

impl Remediation {
    /// `demo_mode` replaces portal links with a plain description
    #[must_use]
    pub fn new(portal_url: &str, demo_mode: bool) -> Self {
        Self {
            portal_url: portal_url.trim_end_matches('/').to_string(),
            demo_mode,
        }
    }

    fn revision_management(&self, scope: &AppScope) -> String {
        if self.demo_mode {
            return format!(
                "Revision Management for {} in the portal",
                scope.app_name
            );
        }
        format!(
            "{}/#@/resource/subscriptions/{}/resourceGroups/{}/providers/Microsoft.App/containerApps/{}/revisionManagement",
            self.portal_url, scope.subscription_id, scope.resource_group, scope.app_name
        )
    }

    /// Steps for viewing the logs of `revision_name`
    #[must_use]
    pub fn suggestion(&self, scope: &AppScope, revision_name: &str) -> String {
        format!(
            "To view logs:\n1. Visit {}\n2. Click on revision '{revision_name}'\n3. View console and system logs\nFor more troubleshooting information, visit {TROUBLESHOOTING_URL}",
            self.revision_management(scope)
        )
    }
}

/// Polls one revision until it is running or has failed
pub struct ReadinessPoller<'a> {
    source: &'a dyn RevisionStatusSource,
    clock: &'a dyn Clock,
    remediation: &'a Remediation,
    scope: &'a AppScope,
}

impl<'a> ReadinessPoller<'a> {
    #[must_use]
    pub fn new(
        source: &'a dyn RevisionStatusSource,
        clock: &'a dyn Clock,
        remediation: &'a Remediation,
        scope: &'a AppScope,
    ) -> Self {
        Self {
            source,
            clock,
            remediation,
            scope,
        }
    }

    /// Poll until the revision runs. Fails on an inactive revision, a failed state, a
    /// request error or cancellation; any other state keeps the loop going.
    pub async fn wait(
        &self,
        cancel: &CancellationToken,
        revision_name: &str,
        progress: Progress<'_>,
    ) -> Result<()> {
        progress(STATUS_PREFIX);
        let mut previous = STATUS_PREFIX.to_string();

        let mut iteration = 0;
        loop {
            iteration += 1;

            let revision = self
                .source
                .revision(cancel, revision_name)
                .await
                .context(format!("getting revision '{revision_name}'"))?;

            if !revision.is_active() {
                return Err(Error::RevisionNotActive(revision_name.to_string()));
            }

            let state = revision.running_state();
            match state.convergence() {
                Convergence::Succeeded => {
                    tracing::info!("revision {} is running", revision_name);
                    return Ok(());
                }
                Convergence::Failed => {
                    return Err(self.failure(
                        revision_name,
                        state,
                        revision.running_state_details(),
                    ));
                }
                Convergence::Converging => {}
            }

            let replicas = self
                .source
                .replicas(cancel, revision_name)
                .await
                .context("listing replicas")?;

            let status = ReplicaSummary::from_replicas(&replicas).status_line(STATUS_PREFIX);
            if status != previous {
                progress(&status);
                previous = status;
            }

            sleep_or_cancel(self.clock, cancel, poll_delay(iteration)).await?;
        }
    }

    fn failure(
        &self,
        revision_name: &str,
        state: RevisionRunningState,
        details: Option<&str>,
    ) -> Error {
        tracing::warn!("revision {} is in a {} state", revision_name, state);
        Error::RevisionState {
            revision: revision_name.to_string(),
            state,
            details: details.map(|d| format!(", {d}")).unwrap_or_default(),
            suggestion: self.remediation.suggestion(self.scope, revision_name),
        }
    }
}

impl ContainerAppService {
    /// Wait for `revision_name` to be running, reporting replica counts on the way
    #[tracing::instrument(level = "debug", skip(self, cancel, progress))]
    pub async fn wait_for_revision_ready(
        &self,
        cancel: &CancellationToken,
        scope: &AppScope,
        revision_name: &str,
        progress: Progress<'_>,
    ) -> Result<()> {
        let source = RevisionStatusClient::new(
            self.client.revisions(scope).await?,
            self.client.replicas(scope).await?,
        );

        ReadinessPoller::new(&source, self.clock.as_ref(), &self.remediation, scope)
            .wait(cancel, revision_name, progress)
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::types::RevisionProperties;
    use serde_json::json;
    use std::sync::Mutex;

    /// Plays back revision states, repeating the last one
    struct Script {
        revisions: Vec<Result<Revision>>,
        replicas: Vec<Replica>,
        calls: Mutex<usize>,
        replica_calls: Mutex<usize>,
    }

    impl Script {
        fn new(revisions: Vec<Result<Revision>>) -> Self {
            Self {
                revisions,
                replicas: Vec::new(),
                calls: Mutex::new(0),
                replica_calls: Mutex::new(0),
            }
        }

        fn with_replicas(self, replicas: Vec<Replica>) -> Self {
            Self { replicas, ..self }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RevisionStatusSource for Script {
        async fn revision(
            &self,
            _cancel: &CancellationToken,
            _revision_name: &str,
        ) -> Result<Revision> {
            let mut calls = self.calls.lock().unwrap();
            let ix = (*calls).min(self.revisions.len() - 1);
            *calls += 1;
            match &self.revisions[ix] {
                Ok(r) => Ok(r.clone()),
                Err(_) => Err(Error::WebServer(500, "500 Internal Server Error".into())),
            }
        }

        async fn replicas(
            &self,
            _cancel: &CancellationToken,
            _revision_name: &str,
        ) -> Result<Vec<Replica>> {
            *self.replica_calls.lock().unwrap() += 1;
            Ok(self.replicas.clone())
        }
    }

    fn revision(active: bool, state: RevisionRunningState) -> Result<Revision> {
        Ok(Revision {
            name: Some("api--azd-1".into()),
            properties: Some(RevisionProperties {
                active: Some(active),
                running_state: Some(state),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn replica(running: bool, ready: &[Option<bool>]) -> Replica {
        let containers: Vec<_> = ready
            .iter()
            .map(|r| match r {
                Some(r) => json!({ "name": "c", "ready": r }),
                None => json!({ "name": "c" }),
            })
            .collect();
        serde_json::from_value(json!({
            "properties": {
                "runningState": if running { "Running" } else { "NotRunning" },
                "containers": containers,
            }
        }))
        .unwrap()
    }

    fn scope() -> AppScope {
        AppScope::new("sub", "rg", "api")
    }

    async fn run(
        source: &Script,
        clock: &dyn Clock,
        remediation: &Remediation,
        messages: &Mutex<Vec<String>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let scope = scope();
        let progress = |m: &str| messages.lock().unwrap().push(m.to_string());
        ReadinessPoller::new(source, clock, remediation, &scope)
            .wait(cancel, "api--azd-1", &progress)
            .await
    }

    fn remediation() -> Remediation {
        Remediation::new("https://portal.example.com/", false)
    }

    #[test]
    fn backoff_schedule() {
        assert_eq!(poll_delay(1), Duration::from_secs(3));
        assert_eq!(poll_delay(20), Duration::from_secs(3));
        assert_eq!(poll_delay(21), Duration::from_secs(10));
        assert_eq!(poll_delay(500), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn succeeds_once_running() {
        use RevisionRunningState::*;
        let source = Script::new(vec![
            revision(true, Processing),
            revision(true, Unknown),
            revision(true, Running),
            revision(true, Failed),
        ]);
        let clock = ManualClock::at_unix(0);
        let messages = Mutex::new(Vec::new());

        run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[tokio::test]
    async fn first_terminal_failure_is_reported() {
        use RevisionRunningState::*;
        for failed in [Failed, Stopped, Degraded] {
            let mut failing = revision(true, failed).unwrap();
            failing.properties.as_mut().unwrap().running_state_details =
                Some("container crashed".into());
            let source = Script::new(vec![
                revision(true, Processing),
                Ok(failing),
                revision(true, Running),
            ]);
            let clock = ManualClock::at_unix(0);
            let messages = Mutex::new(Vec::new());

            let err = run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
                .await
                .unwrap_err();

            assert_eq!(
                err.to_string(),
                format!("revision 'api--azd-1' is in a {failed} state, container crashed")
            );
            let suggestion = err.suggestion().unwrap();
            assert!(suggestion.contains(
                "https://portal.example.com/#@/resource/subscriptions/sub/resourceGroups/rg/providers/Microsoft.App/containerApps/api/revisionManagement"
            ));
            assert!(suggestion.contains("Click on revision 'api--azd-1'"));
            assert!(suggestion.contains(TROUBLESHOOTING_URL));
            assert_eq!(source.calls(), 2);
        }
    }

    #[tokio::test]
    async fn failure_without_details() {
        let source = Script::new(vec![revision(true, RevisionRunningState::Degraded)]);
        let clock = ManualClock::at_unix(0);
        let messages = Mutex::new(Vec::new());

        let err = run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "revision 'api--azd-1' is in a Degraded state"
        );
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn demo_mode_hides_portal_link() {
        let source = Script::new(vec![revision(true, RevisionRunningState::Failed)]);
        let clock = ManualClock::at_unix(0);
        let messages = Mutex::new(Vec::new());
        let remediation = Remediation::new("https://portal.example.com", true);

        let err = run(&source, &clock, &remediation, &messages, &CancellationToken::new())
            .await
            .unwrap_err();
        let suggestion = err.suggestion().unwrap();
        assert!(suggestion.contains("Visit Revision Management for api in the portal"));
        assert!(!suggestion.contains("portal.example.com"));
    }

    #[tokio::test]
    async fn inactive_revision_fails_regardless_of_state() {
        use RevisionRunningState::*;
        for state in [Running, Processing, Failed] {
            let source = Script::new(vec![revision(true, Processing), revision(false, state)]);
            let clock = ManualClock::at_unix(0);
            let messages = Mutex::new(Vec::new());

            let err = run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::RevisionNotActive(ref name) if name == "api--azd-1"));
            assert_eq!(err.to_string(), "revision 'api--azd-1' is not active");
        }
    }

    #[tokio::test]
    async fn progress_is_deduplicated() {
        use RevisionRunningState::*;
        let source = Script::new(vec![
            revision(true, Processing),
            revision(true, Processing),
            revision(true, Processing),
            revision(true, Running),
        ])
        .with_replicas(vec![
            replica(true, &[Some(true), Some(true)]),
            replica(true, &[Some(true), None]),
            replica(false, &[Some(false)]),
        ]);
        let clock = ManualClock::at_unix(0);
        let messages = Mutex::new(Vec::new());

        run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            *messages.lock().unwrap(),
            vec![
                STATUS_PREFIX.to_string(),
                format!("{STATUS_PREFIX}: 2/3 replicas running, 1/3 replicas ready"),
            ]
        );
        assert_eq!(*source.replica_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn backoff_steps_up_after_twenty_polls() {
        let mut states: Vec<_> = (0..25)
            .map(|_| revision(true, RevisionRunningState::Processing))
            .collect();
        states.push(revision(true, RevisionRunningState::Running));
        let source = Script::new(states);
        let clock = ManualClock::at_unix(0);
        let messages = Mutex::new(Vec::new());

        run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
            .await
            .unwrap();

        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 25);
        assert!(sleeps[..20].iter().all(|d| *d == Duration::from_secs(3)));
        assert!(sleeps[20..].iter().all(|d| *d == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn request_errors_are_fatal() {
        let source = Script::new(vec![
            revision(true, RevisionRunningState::Processing),
            Err(Error::API("unused".into())),
        ]);
        let clock = ManualClock::at_unix(0);
        let messages = Mutex::new(Vec::new());

        let err = run(&source, &clock, &remediation(), &messages, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("getting revision 'api--azd-1': HTTP failed 500"));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let source = Script::new(vec![revision(true, RevisionRunningState::Processing)]);
        let messages = Mutex::new(Vec::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = run(&source, &SystemClock, &remediation(), &messages, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(source.calls(), 1);
    }
}
