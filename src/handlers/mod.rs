// handlers/mod.rs - two security tiers
//
// Public (no token) → Protected (session token). The split is enforced by the
// token gate's exempt set, not by router nesting, so every route shares one
// middleware stack.
pub mod protected;
pub mod public;
