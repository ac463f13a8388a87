//! Local pointer collaborator.

/// Control surface over the local pointer: visibility, placement, and the
/// input filter installed while coordination is active. Mocked in tests.
pub trait PointerPort: Send + Sync {
    fn set_visible(&self, visible: bool);

    /// Place the pointer at a position given as percentages of the display.
    fn set_location_percent(&self, x: i32, y: i32);

    /// Install the coordination input filter. Returns false if the
    /// platform refused it.
    fn install_filter(&self) -> bool;

    fn remove_filter(&self);
}
