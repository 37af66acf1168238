/// Types with a value usable in `const` contexts, such as the initializer
/// of a `static` heap.
pub trait Init {
    const INIT: Self;
}
