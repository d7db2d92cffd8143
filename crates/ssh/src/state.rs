use crate::error::SshError;

/// Lifecycle of one ssh session.
///
/// ```text
/// Spawned -> AuthWait -> ShellSync -> Ready -> Closed
///        \-----------\-> Ready (no prompt wanted)
/// any state -> Closed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// ssh is running; nothing has been read yet.
    Spawned,
    /// Waiting for a password prompt, skipping ssh diagnostics.
    AuthWait,
    /// Replacing the login shell and waiting for the token prompt.
    ShellSync,
    /// Authenticated and, if requested, synchronised to the prompt.
    Ready,
    /// The ssh process has been closed.
    Closed,
}

impl SessionState {
    /// True when `self -> next` is a legal move.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Spawned, Self::AuthWait | Self::ShellSync | Self::Ready)
                | (Self::AuthWait, Self::ShellSync | Self::Ready)
                | (Self::ShellSync | Self::Ready, Self::Ready)
                | (Self::Spawned | Self::AuthWait | Self::ShellSync | Self::Ready, Self::Closed)
        )
    }

    /// Moves to `next`, or reports an illegal transition.
    pub(crate) fn advance(&mut self, next: Self) -> Result<(), SshError> {
        if self.can_advance_to(next) {
            *self = next;
            Ok(())
        } else {
            Err(SshError::IllegalTransition {
                from: *self,
                to: next,
            })
        }
    }
}
