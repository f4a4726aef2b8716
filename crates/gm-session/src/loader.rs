//! Namespace → annotation points, end to end.
//!
//! identity key → fetch graph → decode → tags → correlate. The correlation
//! walk is CPU-bound and runs on the blocking pool, polling the caller's
//! cancellation token between seconds.

use std::sync::Arc;

use gm_core::{
    AnnotationPoint, Cancellation, Correlation, Correlator, decode_nodes,
    derive_namespace_identity, extract_tags,
};
use tokio_util::sync::CancellationToken;

use crate::error::LoadError;
use crate::session::GraphSession;
use crate::transport::{Connector, WebSocketConnector};

/// Lets a tokio cancellation token stop a correlation run.
#[derive(Debug, Clone)]
pub struct CancelFlag(pub CancellationToken);

impl Cancellation for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

pub struct AnnotationLoader<C: Connector = WebSocketConnector> {
    session: GraphSession<C>,
    correlator: Arc<Correlator>,
}

impl<C: Connector> AnnotationLoader<C> {
    pub fn new(session: GraphSession<C>, correlator: Correlator) -> Self {
        Self {
            session,
            correlator: Arc::new(correlator),
        }
    }

    pub fn session(&self) -> &GraphSession<C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GraphSession<C> {
        &mut self.session
    }

    /// Read-only points for `namespace` over `0..=duration_seconds`.
    ///
    /// Missing graph data yields an empty list. `cancel` is owned by whoever
    /// owns the video: cancelling it (namespace change, video removed,
    /// teardown) drops any response still in flight and stops correlation.
    pub async fn load(
        &self,
        namespace: &str,
        duration_seconds: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnnotationPoint>, LoadError> {
        Ok(self
            .load_with_stats(namespace, duration_seconds, cancel)
            .await?
            .points)
    }

    pub async fn load_with_stats(
        &self,
        namespace: &str,
        duration_seconds: u64,
        cancel: &CancellationToken,
    ) -> Result<Correlation, LoadError> {
        let identity = derive_namespace_identity(namespace)?;

        let graph = tokio::select! {
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            graph = self.session.fetch_graph(&identity.public_key) => graph,
        };
        if cancel.is_cancelled() {
            tracing::debug!(namespace, "response arrived after cancellation, dropped");
            return Err(LoadError::Cancelled);
        }
        let Some(graph) = graph else {
            return Ok(Correlation::default());
        };

        let tags = extract_tags(&decode_nodes(&graph));
        tracing::debug!(namespace, tags = tags.len(), "tags received");

        let correlator = Arc::clone(&self.correlator);
        let namespace = namespace.to_string();
        let flag = CancelFlag(cancel.clone());
        let run = tokio::task::spawn_blocking(move || {
            correlator.correlate(&namespace, duration_seconds, &tags, &flag)
        });

        match run.await {
            Ok(result) => Ok(result?),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(LoadError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_follows_token() {
        let token = CancellationToken::new();
        let flag = CancelFlag(token.clone());
        assert!(!flag.is_cancelled());
        token.cancel();
        assert!(flag.is_cancelled());
    }
}
