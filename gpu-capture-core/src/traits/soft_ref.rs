/// An owner that keeps an auxiliary count of the objects depending on it.
///
/// Implemented by the device: every live wrapped object holds a soft
/// reference, so the device outlives them even after the application has
/// released its last hard reference to it.
pub trait SoftRefOwner: Send + Sync {
    /// Increment the soft count. Returns the new value.
    fn soft_ref(&self) -> u32;

    /// Decrement the soft count. Returns the new value.
    fn soft_release(&self) -> u32;
}
