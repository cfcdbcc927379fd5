// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forward and pre-forward hook management.
//!
//! [`HookRegistry`] tracks hooks registered against a module tree, keyed by
//! dotted module path (`transformer.h.3.attn`). A pre-forward hook observes
//! a module's input, a forward hook its output; either may replace the
//! tensor by returning `Some`. The caller's forward pass consults the
//! registry via [`apply_pre_forward`](HookRegistry::apply_pre_forward) and
//! [`apply_forward`](HookRegistry::apply_forward) at each module boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use candle_core::Tensor;
use tracing::debug;

use crate::error::Result;

// ---------------------------------------------------------------------------
// HookKind
// ---------------------------------------------------------------------------

/// Whether a hook runs before or after a module's computation.
#[allow(clippy::exhaustive_enums)] // exactly two hook kinds exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs on the module's input, before its computation.
    PreForward,
    /// Runs on the module's output, after its computation.
    Forward,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreForward => write!(f, "pre-forward"),
            Self::Forward => write!(f, "forward"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hook bodies and handles
// ---------------------------------------------------------------------------

/// Boxed hook body.
///
/// A hook observes the tensor flowing through its module and may replace
/// it by returning `Some`. Returning `None` leaves the tensor untouched.
/// A replacement is installed as-is and does not have to keep the observed
/// shape, so hooks can truncate or pad along any dimension.
pub type HookFn = Box<dyn Fn(&Tensor) -> Result<Option<Tensor>> + Send + Sync>;

/// A registered hook: its id, a display label, and the body.
struct NamedHook {
    id: u64,
    label: String,
    f: HookFn,
}

/// Handle returned by registration, used to detach one specific hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookHandle {
    kind: HookKind,
    path: String,
    id: u64,
}

impl HookHandle {
    /// Kind of the hook this handle refers to.
    #[must_use]
    pub const fn kind(&self) -> HookKind {
        self.kind
    }

    /// Dotted path of the module the hook is attached to.
    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.path
    }

    /// Registry-wide id of the hook.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

// ---------------------------------------------------------------------------
// HookRegistry
// ---------------------------------------------------------------------------

/// Registry of forward and pre-forward hooks for a module tree.
///
/// Module paths are dotted names; the root module is the empty path. Hooks
/// attached to the same module run in registration order, and ids are
/// allocated from one registry-wide counter so every handle is unique.
///
/// # Example
///
/// ```
/// use candle_core::{Device, Tensor};
/// use candle_interp::HookRegistry;
///
/// let mut hooks = HookRegistry::new();
/// hooks.register_forward("blocks.0", "double", |t: &Tensor| Ok(Some((t * 2.0)?)));
///
/// let x = Tensor::new(&[1.0f32, 2.0], &Device::Cpu).unwrap();
/// let y = hooks.apply_forward("blocks.0", &x).unwrap();
/// assert_eq!(y.to_vec1::<f32>().unwrap(), vec![2.0, 4.0]);
/// ```
#[derive(Default)]
pub struct HookRegistry {
    next_id: u64,
    pre_forward: BTreeMap<String, Vec<NamedHook>>,
    forward: BTreeMap<String, Vec<NamedHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("num_hooks", &self.num_hooks())
            .field("modules", &self.module_paths())
            .finish_non_exhaustive()
    }
}

impl HookRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Registration ----------------------------------------------------

    /// Attach a forward hook to the module at `module_path`.
    ///
    /// The hook observes the module's output. `label` is what the hook
    /// listing shows for it.
    pub fn register_forward<F>(
        &mut self,
        module_path: impl Into<String>,
        label: impl Into<String>,
        hook: F,
    ) -> HookHandle
    where
        F: Fn(&Tensor) -> Result<Option<Tensor>> + Send + Sync + 'static,
    {
        self.register(
            HookKind::Forward,
            module_path.into(),
            label.into(),
            Box::new(hook),
        )
    }

    /// Attach a pre-forward hook to the module at `module_path`.
    ///
    /// The hook observes the module's input.
    pub fn register_pre_forward<F>(
        &mut self,
        module_path: impl Into<String>,
        label: impl Into<String>,
        hook: F,
    ) -> HookHandle
    where
        F: Fn(&Tensor) -> Result<Option<Tensor>> + Send + Sync + 'static,
    {
        self.register(
            HookKind::PreForward,
            module_path.into(),
            label.into(),
            Box::new(hook),
        )
    }

    /// Allocate an id and append the hook to its module's chain.
    fn register(&mut self, kind: HookKind, path: String, label: String, f: HookFn) -> HookHandle {
        let id = self.next_id;
        self.next_id += 1;

        let handle = HookHandle {
            kind,
            path: path.clone(),
            id,
        };
        self.map_mut(kind)
            .entry(path)
            .or_default()
            .push(NamedHook { id, label, f });
        handle
    }

    // --- Application -----------------------------------------------------

    /// Run the pre-forward hooks attached to `module_path` on the module's
    /// input tensor.
    ///
    /// # Errors
    ///
    /// Propagates the error of the first hook body that fails.
    pub fn apply_pre_forward(&self, module_path: &str, input: &Tensor) -> Result<Tensor> {
        self.apply(HookKind::PreForward, module_path, input)
    }

    /// Run the forward hooks attached to `module_path` on the module's
    /// output tensor.
    ///
    /// # Errors
    ///
    /// Propagates the error of the first hook body that fails.
    pub fn apply_forward(&self, module_path: &str, output: &Tensor) -> Result<Tensor> {
        self.apply(HookKind::Forward, module_path, output)
    }

    /// Thread the tensor through the chain at `path`, if any.
    fn apply(&self, kind: HookKind, path: &str, tensor: &Tensor) -> Result<Tensor> {
        // Tensor clone is a reference-count bump, so the no-hook case adds
        // no tensor traffic.
        let mut current = tensor.clone();
        if let Some(chain) = self.map(kind).get(path) {
            for hook in chain {
                if let Some(replacement) = (hook.f)(&current)? {
                    current = replacement;
                }
            }
        }
        Ok(current)
    }

    // --- Removal ---------------------------------------------------------

    /// Detach the hook behind `handle`.
    ///
    /// Returns `false` if the hook was already removed.
    pub fn remove(&mut self, handle: &HookHandle) -> bool {
        let map = self.map_mut(handle.kind);
        if let Some(chain) = map.get_mut(&handle.path) {
            let before = chain.len();
            chain.retain(|hook| hook.id != handle.id);
            let removed = chain.len() < before;
            if chain.is_empty() {
                map.remove(&handle.path);
            }
            removed
        } else {
            false
        }
    }

    /// Detach every hook, forward and pre-forward, from the whole tree.
    pub fn clear(&mut self) {
        let removed = self.num_hooks();
        self.pre_forward.clear();
        self.forward.clear();
        if removed > 0 {
            debug!(removed, "cleared all hooks");
        }
    }

    /// Detach every hook from the module at `module_path` and from all of
    /// its submodules.
    ///
    /// Matching is by dotted-path prefix: `clear_subtree("h.0")` detaches
    /// hooks on `h.0` and `h.0.attn` but not on `h.01`. An empty path
    /// clears the whole tree.
    pub fn clear_subtree(&mut self, module_path: &str) {
        if module_path.is_empty() {
            self.clear();
            return;
        }

        let children = format!("{module_path}.");
        let keep = |path: &String| path.as_str() != module_path && !path.starts_with(&children);
        let before = self.num_hooks();
        self.pre_forward.retain(|path, _| keep(path));
        self.forward.retain(|path, _| keep(path));

        let removed = before - self.num_hooks();
        if removed > 0 {
            debug!(removed, module_path, "cleared subtree hooks");
        }
    }

    // --- Queries ---------------------------------------------------------

    /// Check whether the registry has no hooks at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pre_forward.is_empty() && self.forward.is_empty()
    }

    /// Total number of registered hooks of both kinds.
    #[must_use]
    pub fn num_hooks(&self) -> usize {
        let count =
            |map: &BTreeMap<String, Vec<NamedHook>>| map.values().map(Vec::len).sum::<usize>();
        count(&self.pre_forward) + count(&self.forward)
    }

    /// Number of hooks of `kind` attached to the module at `module_path`.
    #[must_use]
    pub fn num_hooks_at(&self, module_path: &str, kind: HookKind) -> usize {
        self.map(kind).get(module_path).map_or(0, Vec::len)
    }

    /// Sorted paths of every module that has at least one hook.
    #[must_use]
    pub fn module_paths(&self) -> Vec<&str> {
        let mut paths: BTreeSet<&str> = BTreeSet::new();
        paths.extend(self.pre_forward.keys().map(String::as_str));
        paths.extend(self.forward.keys().map(String::as_str));
        paths.into_iter().collect()
    }

    // --- Listing ---------------------------------------------------------

    /// Human-readable listing of every hooked module.
    ///
    /// The root module (empty path) is shown as `Main Module`. Within a
    /// module, forward hooks are listed before pre-forward hooks, each in
    /// registration order.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for path in self.module_paths() {
            let display = if path.is_empty() { "Main Module" } else { path };
            out.push_str(&format!("Module: {display}\n"));
            for kind in [HookKind::Forward, HookKind::PreForward] {
                if let Some(chain) = self.map(kind).get(path) {
                    for hook in chain {
                        out.push_str(&format!("  ID: {}, {kind} hook: {}\n", hook.id, hook.label));
                    }
                }
            }
        }
        out
    }

    /// Print [`summary`](Self::summary) to stdout.
    pub fn print_hooks(&self) {
        print!("{}", self.summary());
    }

    // --- Internals -------------------------------------------------------

    /// The per-kind hook map.
    fn map(&self, kind: HookKind) -> &BTreeMap<String, Vec<NamedHook>> {
        match kind {
            HookKind::PreForward => &self.pre_forward,
            HookKind::Forward => &self.forward,
        }
    }

    /// The per-kind hook map, mutably.
    fn map_mut(&mut self, kind: HookKind) -> &mut BTreeMap<String, Vec<NamedHook>> {
        match kind {
            HookKind::PreForward => &mut self.pre_forward,
            HookKind::Forward => &mut self.forward,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use candle_core::Device;

    use super::*;
    use crate::error::InterpError;

    fn ones(device: &Device) -> Tensor {
        Tensor::new(&[1.0f32, 1.0], device).unwrap()
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let device = Device::Cpu;
        let mut hooks = HookRegistry::new();
        hooks.register_forward("blocks.0", "add-one", |t: &Tensor| Ok(Some((t + 1.0)?)));
        hooks.register_forward("blocks.0", "double", |t: &Tensor| Ok(Some((t * 2.0)?)));

        // (1 + 1) * 2, not 1 * 2 + 1.
        let out = hooks.apply_forward("blocks.0", &ones(&device)).unwrap();
        assert_eq!(out.to_vec1::<f32>().unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn kinds_are_independent() {
        let device = Device::Cpu;
        let mut hooks = HookRegistry::new();
        hooks.register_pre_forward("blocks.0", "halve", |t: &Tensor| Ok(Some((t * 0.5)?)));

        let pre = hooks.apply_pre_forward("blocks.0", &ones(&device)).unwrap();
        assert_eq!(pre.to_vec1::<f32>().unwrap(), vec![0.5, 0.5]);

        // No forward hooks registered on this module.
        let fwd = hooks.apply_forward("blocks.0", &ones(&device)).unwrap();
        assert_eq!(fwd.to_vec1::<f32>().unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn observer_hook_leaves_tensor_untouched() {
        let device = Device::Cpu;
        let mut hooks = HookRegistry::new();
        hooks.register_forward("mlp", "observe", |_t: &Tensor| Ok(None));

        let out = hooks.apply_forward("mlp", &ones(&device)).unwrap();
        assert_eq!(out.to_vec1::<f32>().unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn empty_registry_passes_through() {
        let device = Device::Cpu;
        let hooks = HookRegistry::new();
        assert!(hooks.is_empty());

        let out = hooks.apply_forward("anything", &ones(&device)).unwrap();
        assert_eq!(out.to_vec1::<f32>().unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn replacement_may_change_shape() {
        let device = Device::Cpu;
        let mut hooks = HookRegistry::new();
        hooks.register_forward("blocks.0", "truncate", |t: &Tensor| Ok(Some(t.narrow(0, 0, 1)?)));

        let x = Tensor::zeros((4, 8), candle_core::DType::F32, &device).unwrap();
        let out = hooks.apply_forward("blocks.0", &x).unwrap();
        assert_eq!(out.dims(), &[1, 8]);
    }

    #[test]
    fn hook_body_error_propagates() {
        let device = Device::Cpu;
        let mut hooks = HookRegistry::new();
        hooks.register_forward("blocks.0", "fail", |_t: &Tensor| {
            Err(InterpError::Hook("nan in activation".into()))
        });

        let err = hooks.apply_forward("blocks.0", &ones(&device));
        assert!(matches!(err, Err(InterpError::Hook(_))));
    }

    #[test]
    fn remove_detaches_exactly_one_hook() {
        let device = Device::Cpu;
        let mut hooks = HookRegistry::new();
        let add = hooks.register_forward("blocks.0", "add-one", |t: &Tensor| Ok(Some((t + 1.0)?)));
        hooks.register_forward("blocks.0", "double", |t: &Tensor| Ok(Some((t * 2.0)?)));

        assert!(hooks.remove(&add));
        assert_eq!(hooks.num_hooks(), 1);

        let out = hooks.apply_forward("blocks.0", &ones(&device)).unwrap();
        assert_eq!(out.to_vec1::<f32>().unwrap(), vec![2.0, 2.0]);

        // Second removal of the same handle is a no-op.
        assert!(!hooks.remove(&add));
    }

    #[test]
    fn clear_empties_both_kinds() {
        let mut hooks = HookRegistry::new();
        hooks.register_forward("a", "f", |_t: &Tensor| Ok(None));
        hooks.register_pre_forward("b", "p", |_t: &Tensor| Ok(None));
        assert_eq!(hooks.num_hooks(), 2);

        hooks.clear();
        assert!(hooks.is_empty());
    }

    #[test]
    fn clear_subtree_respects_path_boundaries() {
        let mut hooks = HookRegistry::new();
        hooks.register_forward("h.0", "a", |_t: &Tensor| Ok(None));
        hooks.register_forward("h.0.attn", "b", |_t: &Tensor| Ok(None));
        hooks.register_pre_forward("h.01", "c", |_t: &Tensor| Ok(None));

        hooks.clear_subtree("h.0");
        assert_eq!(hooks.num_hooks(), 1);
        assert_eq!(hooks.module_paths(), vec!["h.01"]);
    }

    #[test]
    fn clear_subtree_with_empty_path_clears_all() {
        let mut hooks = HookRegistry::new();
        hooks.register_forward("h.0", "a", |_t: &Tensor| Ok(None));
        hooks.register_pre_forward("", "root", |_t: &Tensor| Ok(None));

        hooks.clear_subtree("");
        assert!(hooks.is_empty());
    }

    #[test]
    fn summary_names_root_as_main_module() {
        let mut hooks = HookRegistry::new();
        hooks.register_forward("", "scale-embed", |_t: &Tensor| Ok(None));
        hooks.register_pre_forward("", "log-input", |_t: &Tensor| Ok(None));

        let summary = hooks.summary();
        assert_eq!(summary.matches("Module:").count(), 1);
        assert!(summary.contains("Module: Main Module"));
        assert!(summary.contains("ID: 0, forward hook: scale-embed"));
        assert!(summary.contains("ID: 1, pre-forward hook: log-input"));
    }

    #[test]
    fn summary_lists_modules_in_sorted_order() {
        let mut hooks = HookRegistry::new();
        hooks.register_forward("transformer.h.1", "b", |_t: &Tensor| Ok(None));
        hooks.register_forward("transformer.h.0", "a", |_t: &Tensor| Ok(None));

        let paths = hooks.module_paths();
        assert_eq!(paths, vec!["transformer.h.0", "transformer.h.1"]);

        let summary = hooks.summary();
        let first = summary.find("transformer.h.0").unwrap();
        let second = summary.find("transformer.h.1").unwrap();
        assert!(first < second);
    }

    #[test]
    fn handle_reports_registration_details() {
        let mut hooks = HookRegistry::new();
        let handle = hooks.register_pre_forward("wte", "patch", |_t: &Tensor| Ok(None));

        assert_eq!(handle.kind(), HookKind::PreForward);
        assert_eq!(handle.module_path(), "wte");
        assert_eq!(handle.id(), 0);
        assert_eq!(hooks.num_hooks_at("wte", HookKind::PreForward), 1);
        assert_eq!(hooks.num_hooks_at("wte", HookKind::Forward), 0);
    }
}
