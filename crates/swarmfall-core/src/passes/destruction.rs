//! Second phase of two-phase destroy.
//!
//! An entity marked with [`PendingDestroy`] during tick `N` is visible to
//! every pass of tick `N + 1` (as [`PassView::is_dying`]), and removed by this
//! pass's raw destroy at the end of tick `N + 1`.

use crate::component::{ComponentKind, PendingDestroy};
use crate::error::Result;
use crate::intent::IntentWriter;
use crate::pass::{Pass, PassContext, PassDeclaration, TickContext};
use crate::view::PassView;

/// Removes marked entities.
///
/// # Example
///
/// ```
/// use swarmfall_core::passes::DestructionPass;
/// use swarmfall_core::pass::Pass;
///
/// let pass = DestructionPass::new();
/// assert_eq!(pass.declaration().name, "destruction");
/// ```
#[derive(Debug, Clone)]
pub struct DestructionPass {
    declaration: PassDeclaration,
}

impl DestructionPass {
    /// Creates a new `DestructionPass`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PassDeclaration::new("destruction")
                .writes([ComponentKind::PendingDestroy]),
        }
    }
}

impl Default for DestructionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for DestructionPass {
    type Driver = PendingDestroy;
    type Shared = ();

    fn declaration(&self) -> &PassDeclaration {
        &self.declaration
    }

    fn prepare(&self, _ctx: &TickContext<'_>, _view: &PassView<'_>) {}

    fn run(
        &self,
        ctx: &PassContext<'_>,
        (): &(),
        _view: &PassView<'_>,
        marker: &mut PendingDestroy,
        out: &mut IntentWriter,
    ) -> Result<()> {
        marker.ticks_elapsed += 1;
        out.despawn(ctx.entity);
        Ok(())
    }
}
