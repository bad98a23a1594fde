//! Presentation sink contract.

use core_cache::RowCache;
use core_range::RowRange;

/// Everything a renderer needs to paint one frame. Misses inside `rendered`
/// are painted as placeholders; the engine never waits on the renderer.
#[derive(Debug)]
pub struct RenderFrame<'a, P> {
    pub rendered: RowRange,
    pub visible: RowRange,
    pub scroll_offset: usize,
    pub row_height: usize,
    pub extent: usize,
    pub width: usize,
    pub cache: &'a RowCache<P>,
    pub in_flight: Option<RowRange>,
}

impl<P> RenderFrame<'_, P> {
    /// Indices of `rendered` with no cached row.
    pub fn placeholders(&self) -> usize {
        self.rendered.len() - self.cache.count_in(self.rendered)
    }
}

pub trait RowRenderer<P>: Send {
    fn paint(&mut self, frame: &RenderFrame<'_, P>);
}

/// Renderer that paints nothing; used when the engine runs headless.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl<P> RowRenderer<P> for NullRenderer {
    fn paint(&mut self, _frame: &RenderFrame<'_, P>) {}
}
