//! In-process replica group.
//!
//! `LocalGroup` keeps the membership view and dispatches requests straight to
//! each member's [`ReplicaHandler`]. Every delivery runs as its own task under
//! a single deadline, so one slow member never holds up the others.
//!
//! Members can be given a [`MemberFault`] to simulate a hung or slow replica.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, Weak},
    time::Duration,
};

use async_trait::async_trait;
use gavel_proto::{ReplicaRequest, ReplicaResponse};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::transport::{MemberId, ReplicaHandler, Responses, Transport, TransportError};

/// Injected misbehaviour of one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemberFault {
    /// Answers normally.
    #[default]
    None,
    /// Never answers; every request times out.
    Unresponsive,
    /// Answers after the given delay.
    Delay(Duration),
}

struct Member {
    handler: Arc<dyn ReplicaHandler>,
    fault: MemberFault,
}

#[derive(Default)]
struct GroupInner {
    members: RwLock<BTreeMap<MemberId, Member>>,
}

impl GroupInner {
    fn target(&self, id: MemberId) -> Option<(Arc<dyn ReplicaHandler>, MemberFault)> {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        members.get(&id).map(|m| (Arc::clone(&m.handler), m.fault))
    }

    fn targets(&self, except: Option<MemberId>) -> Vec<(MemberId, Arc<dyn ReplicaHandler>, MemberFault)> {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        members
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .map(|(id, m)| (*id, Arc::clone(&m.handler), m.fault))
            .collect()
    }
}

/// Membership view shared by every transport handed out from it.
#[derive(Clone, Default)]
pub struct LocalGroup {
    inner: Arc<GroupInner>,
}

impl LocalGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a member.
    pub fn join(&self, id: MemberId, handler: Arc<dyn ReplicaHandler>) {
        let mut members = self.inner.members.write().unwrap_or_else(PoisonError::into_inner);
        members.insert(id, Member { handler, fault: MemberFault::None });
        info!(member = %id, view = members.len(), "member joined");
    }

    /// Remove a member that left cleanly.
    pub fn leave(&self, id: MemberId) -> bool {
        let mut members = self.inner.members.write().unwrap_or_else(PoisonError::into_inner);
        let removed = members.remove(&id).is_some();
        if removed {
            info!(member = %id, view = members.len(), "member left");
        }
        removed
    }

    /// Remove a member suspected of having failed. It receives no further
    /// broadcasts until it joins again.
    pub fn suspect(&self, id: MemberId) -> bool {
        let mut members = self.inner.members.write().unwrap_or_else(PoisonError::into_inner);
        let removed = members.remove(&id).is_some();
        if removed {
            warn!(member = %id, view = members.len(), "member suspected, removed from view");
        }
        removed
    }

    /// Inject a fault into a member. Returns false if it is not in the view.
    pub fn set_fault(&self, id: MemberId, fault: MemberFault) -> bool {
        let mut members = self.inner.members.write().unwrap_or_else(PoisonError::into_inner);
        match members.get_mut(&id) {
            Some(member) => {
                debug!(member = %id, ?fault, "fault injected");
                member.fault = fault;
                true
            },
            None => false,
        }
    }

    /// Current membership view in id order.
    pub fn members(&self) -> Vec<MemberId> {
        self.inner.members.read().unwrap_or_else(PoisonError::into_inner).keys().copied().collect()
    }

    /// A transport for `local`, or for an observer outside the group when
    /// `local` is `None`.
    pub fn transport(&self, local: Option<MemberId>) -> LocalTransport {
        LocalTransport { group: Arc::downgrade(&self.inner), local }
    }
}

/// [`Transport`] over a [`LocalGroup`].
///
/// Holds the group weakly so that members owning a transport do not keep the
/// group alive.
#[derive(Clone)]
pub struct LocalTransport {
    group: Weak<GroupInner>,
    local: Option<MemberId>,
}

async fn deliver(
    handler: Arc<dyn ReplicaHandler>,
    fault: MemberFault,
    request: ReplicaRequest,
    timeout: Duration,
) -> Result<ReplicaResponse, TransportError> {
    let work = async move {
        match fault {
            MemberFault::None => {},
            MemberFault::Delay(delay) => tokio::time::sleep(delay).await,
            MemberFault::Unresponsive => std::future::pending::<()>().await,
        }
        handler.handle(request).await
    };

    tokio::time::timeout(timeout, work).await.map_err(|_| TransportError::Timeout)
}

#[async_trait]
impl Transport for LocalTransport {
    fn local_id(&self) -> Option<MemberId> {
        self.local
    }

    fn members(&self) -> Vec<MemberId> {
        self.group.upgrade().map_or_else(Vec::new, |group| {
            group.members.read().unwrap_or_else(PoisonError::into_inner).keys().copied().collect()
        })
    }

    async fn broadcast(&self, request: ReplicaRequest, timeout: Duration) -> Responses {
        let Some(group) = self.group.upgrade() else {
            return Vec::new();
        };

        let mut tasks = JoinSet::new();
        for (id, handler, fault) in group.targets(self.local) {
            let request = request.clone();
            tasks.spawn(async move { (id, deliver(handler, fault, request, timeout).await) });
        }

        let mut responses = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(response) => responses.push(response),
                Err(e) => warn!(error = %e, "delivery task failed"),
            }
        }

        responses.sort_by_key(|(id, _)| *id);
        debug!(
            request = request.name(),
            answered = responses.iter().filter(|(_, r)| r.is_ok()).count(),
            targeted = responses.len(),
            "broadcast complete"
        );
        responses
    }

    async fn call(
        &self,
        member: MemberId,
        request: ReplicaRequest,
        timeout: Duration,
    ) -> Result<ReplicaResponse, TransportError> {
        let group = self.group.upgrade().ok_or(TransportError::Unreachable)?;
        let (handler, fault) = group.target(member).ok_or(TransportError::UnknownMember)?;

        // Run in its own task so a cancelled caller does not abort the member
        // halfway through handling.
        tokio::spawn(deliver(handler, fault, request, timeout))
            .await
            .map_err(|_| TransportError::Unreachable)?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Echo {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl ReplicaHandler for Echo {
        async fn handle(&self, _request: ReplicaRequest) -> ReplicaResponse {
            self.hits.fetch_add(1, Ordering::SeqCst);
            ReplicaResponse::Ack
        }
    }

    fn echo() -> Arc<Echo> {
        Arc::new(Echo { hits: AtomicUsize::new(0) })
    }

    const TIMEOUT: Duration = Duration::from_millis(2000);

    #[tokio::test]
    async fn broadcast_skips_local_member() {
        let group = LocalGroup::new();
        let (a, b, c) = (echo(), echo(), echo());
        group.join(MemberId(1), a.clone());
        group.join(MemberId(2), b.clone());
        group.join(MemberId(3), c.clone());

        let responses = group.transport(Some(MemberId(2))).broadcast(ReplicaRequest::Snapshot, TIMEOUT).await;

        let ids: Vec<_> = responses.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![MemberId(1), MemberId(3)]);
        assert_eq!(b.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn observer_reaches_every_member() {
        let group = LocalGroup::new();
        group.join(MemberId(1), echo());
        group.join(MemberId(2), echo());

        let responses = group.transport(None).broadcast(ReplicaRequest::Snapshot, TIMEOUT).await;
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|(_, r)| *r == Ok(ReplicaResponse::Ack)));
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_member_times_out() {
        let group = LocalGroup::new();
        group.join(MemberId(1), echo());
        group.join(MemberId(2), echo());
        group.set_fault(MemberId(2), MemberFault::Unresponsive);

        let responses = group.transport(None).broadcast(ReplicaRequest::Snapshot, TIMEOUT).await;

        assert_eq!(responses[0], (MemberId(1), Ok(ReplicaResponse::Ack)));
        assert_eq!(responses[1], (MemberId(2), Err(TransportError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_within_deadline_still_answers() {
        let group = LocalGroup::new();
        group.join(MemberId(1), echo());
        group.set_fault(MemberId(1), MemberFault::Delay(Duration::from_millis(500)));

        let transport = group.transport(None);
        assert_eq!(
            transport.call(MemberId(1), ReplicaRequest::Snapshot, TIMEOUT).await,
            Ok(ReplicaResponse::Ack)
        );

        group.set_fault(MemberId(1), MemberFault::Delay(Duration::from_secs(5)));
        assert_eq!(
            transport.call(MemberId(1), ReplicaRequest::Snapshot, TIMEOUT).await,
            Err(TransportError::Timeout)
        );
    }

    #[tokio::test]
    async fn suspected_member_leaves_view() {
        let group = LocalGroup::new();
        group.join(MemberId(1), echo());
        group.join(MemberId(2), echo());

        assert!(group.suspect(MemberId(2)));
        assert!(!group.leave(MemberId(2)));
        assert_eq!(group.members(), vec![MemberId(1)]);

        let transport = group.transport(None);
        assert_eq!(
            transport.call(MemberId(2), ReplicaRequest::Snapshot, TIMEOUT).await,
            Err(TransportError::UnknownMember)
        );
    }

    #[tokio::test]
    async fn dropped_group_is_unreachable() {
        let transport = {
            let group = LocalGroup::new();
            group.join(MemberId(1), echo());
            group.transport(None)
        };

        assert!(transport.members().is_empty());
        assert!(transport.broadcast(ReplicaRequest::Snapshot, TIMEOUT).await.is_empty());
        assert_eq!(
            transport.call(MemberId(1), ReplicaRequest::Snapshot, TIMEOUT).await,
            Err(TransportError::Unreachable)
        );
    }
}
