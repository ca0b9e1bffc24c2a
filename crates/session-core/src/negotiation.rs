//! Async negotiation steps shared by the orchestrator's flows
//!
//! Both helpers hold the session's negotiation lock, so a buffered
//! candidate flush always completes before any later candidate is applied
//! to the same connection.

use parking_lot::Mutex;
use rtcall_signal_core::{IceCandidate, SessionDescription};
use tracing::{debug, warn};

use crate::controller::PeerSessionController;
use crate::error::{SessionError, SessionResult};
use crate::session::Negotiation;

/// Apply the peer's description and flush buffered candidates in order
///
/// Returns the number of flushed candidates. Candidates the engine rejects
/// are logged and skipped.
pub async fn apply_remote_description(
    controller: &Mutex<PeerSessionController>,
    negotiation: &Negotiation,
    description: SessionDescription,
) -> SessionResult<usize> {
    let _guard = negotiation.lock().await;
    negotiation
        .connection
        .set_remote_description(description)
        .await?;

    let pending = controller.lock().mark_remote_applied(&negotiation.session_id);
    let Some(pending) = pending else {
        return Err(SessionError::stale(negotiation.session_id));
    };

    let flushed = pending.len();
    for candidate in pending {
        add_candidate(negotiation, candidate).await;
    }
    debug!(
        "Remote description applied for {} ({} buffered candidates)",
        negotiation.session_id, flushed
    );
    Ok(flushed)
}

/// Apply one remote candidate after any in-progress flush
pub async fn apply_candidate(negotiation: &Negotiation, candidate: IceCandidate) -> bool {
    let _guard = negotiation.lock().await;
    add_candidate(negotiation, candidate).await
}

async fn add_candidate(negotiation: &Negotiation, candidate: IceCandidate) -> bool {
    match negotiation.connection.add_ice_candidate(candidate).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Skipping remote candidate for {}: {}",
                negotiation.session_id, e
            );
            false
        }
    }
}
