use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tracing::debug;

use sdn_fabric::{EventHandler, EventReceiver};

/// Dispatches fabric events to a handler until the event channel closes.
pub(crate) struct ControllerDriver<H> {
    /// Events delivered by the fabric.
    pub(crate) events: EventReceiver,
    /// The handler every event is dispatched to.
    pub(crate) handler: Arc<H>,
}

impl<H: EventHandler> Future for ControllerDriver<H> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            match this.events.poll_recv(cx) {
                Poll::Ready(Some(event)) => event.dispatch(this.handler.as_ref()),
                Poll::Ready(None) => {
                    debug!("Event channel closed, shutting down controller driver");
                    return Poll::Ready(());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
