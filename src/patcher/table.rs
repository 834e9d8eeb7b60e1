use super::{CodePatcher, Frame, Invocation, PatchHandle, Replacement};
use crate::config::PatcherConfig;
use crate::error::{Exception, Result, WeaverError};
use crate::selector::Selector;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Original implementation stored in a [`FunctionTable`]
///
/// Receives the table so it can make further (possibly intercepted) calls.
pub type Callable = Rc<dyn Fn(&FunctionTable, &Invocation) -> Result<Value>>;

/// In-memory code patcher
///
/// Holds the original implementation of every defined callable plus a stack
/// of installed replacements per selector. Calls made through
/// [`FunctionTable::call`] run the most recently installed replacement, or
/// the original when none is installed.
///
/// # Example Usage
/// ```
/// use patchweave::patcher::FunctionTable;
/// use serde_json::json;
///
/// let table = FunctionTable::new();
/// table.define_function("double", |_, inv| {
///     Ok(json!(inv.args[0].as_i64().unwrap_or(0) * 2))
/// })?;
/// assert_eq!(table.call("double", vec![json!(21)])?, json!(42));
/// # Ok::<(), patchweave::WeaverError>(())
/// ```
#[derive(Default)]
pub struct FunctionTable {
    originals: RefCell<HashMap<Selector, Callable>>,

    /// Installed replacements, most recent last
    patches: RefCell<HashMap<Selector, Vec<(PatchHandle, Replacement)>>>,

    /// Active call stack, innermost last
    frames: RefCell<Vec<Frame>>,

    next_patch: Cell<u64>,

    /// Selectors that refuse a replacement
    blacklist: HashSet<Selector>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table honoring the patcher section of the configuration
    pub fn with_config(config: &PatcherConfig) -> Result<Self> {
        let blacklist = config
            .blacklist
            .iter()
            .map(|raw| Selector::parse(raw))
            .collect::<Result<HashSet<_>>>()?;

        Ok(Self {
            blacklist,
            ..Self::default()
        })
    }

    /// Define (or redefine) a plain function
    pub fn define_function<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&FunctionTable, &Invocation) -> Result<Value> + 'static,
    {
        let selector = Selector::parse(name)?;
        if selector.is_method() {
            return Err(WeaverError::Pointcut(format!(
                "{} is a method selector; use define_method",
                selector
            )));
        }
        self.originals.borrow_mut().insert(selector, Rc::new(f));
        Ok(())
    }

    /// Define (or redefine) a method on `type_name`
    pub fn define_method<F>(&self, type_name: &str, member: &str, f: F) -> Result<()>
    where
        F: Fn(&FunctionTable, &Invocation) -> Result<Value> + 'static,
    {
        let selector = Selector::method(type_name, member)?;
        self.originals.borrow_mut().insert(selector, Rc::new(f));
        Ok(())
    }

    pub fn is_defined(&self, selector: &str) -> bool {
        Selector::parse(selector)
            .map(|s| self.originals.borrow().contains_key(&s))
            .unwrap_or(false)
    }

    /// Number of replacements currently installed for `selector`
    pub fn patch_count(&self, selector: &str) -> usize {
        Selector::parse(selector)
            .ok()
            .and_then(|s| self.patches.borrow().get(&s).map(Vec::len))
            .unwrap_or(0)
    }

    /// Call a plain function (or a method without receiver)
    pub fn call(&self, selector: &str, args: Vec<Value>) -> Result<Value> {
        let selector = Selector::parse(selector)?;
        self.route(&selector, Invocation::function(args))
    }

    /// Call a method on `receiver`
    pub fn call_method(&self, selector: &str, receiver: Value, args: Vec<Value>) -> Result<Value> {
        let selector = Selector::parse(selector)?;
        self.route(&selector, Invocation::method(receiver, args))
    }

    fn route(&self, selector: &Selector, invocation: Invocation) -> Result<Value> {
        // Clone out of the map: the replacement may install/remove patches
        let replacement = self
            .patches
            .borrow()
            .get(selector)
            .and_then(|stack| stack.last().map(|(_, r)| Rc::clone(r)));

        let _frame = self.push_frame(selector, &invocation);
        match replacement {
            Some(replacement) => replacement(&invocation),
            None => self.run_original(selector, &invocation),
        }
    }

    fn run_original(&self, selector: &Selector, invocation: &Invocation) -> Result<Value> {
        let original = self.originals.borrow().get(selector).cloned();
        match original {
            Some(original) => original(self, invocation),
            None if selector.is_method() => Err(Exception::new(
                "Error",
                format!("Call to undefined method {}()", selector),
            )
            .into()),
            None => Err(Exception::new(
                "Error",
                format!("Call to undefined function {}()", selector),
            )
            .into()),
        }
    }

    fn push_frame(&self, selector: &Selector, invocation: &Invocation) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame {
            selector: selector.clone(),
            receiver: invocation.receiver.clone(),
            args: invocation.args.clone(),
        });
        FrameGuard {
            frames: &self.frames,
        }
    }
}

impl CodePatcher for FunctionTable {
    fn install(&self, selector: &Selector, replacement: Replacement) -> Result<PatchHandle> {
        if self.blacklist.contains(selector) {
            return Err(WeaverError::Patcher(format!(
                "{} is blacklisted and cannot be redefined",
                selector
            )));
        }

        let id = self.next_patch.get() + 1;
        self.next_patch.set(id);
        let handle = PatchHandle::new(id);

        if !self.originals.borrow().contains_key(selector) {
            tracing::debug!("Queueing replacement {} until {} is defined", handle, selector);
        }

        self.patches
            .borrow_mut()
            .entry(selector.clone())
            .or_default()
            .push((handle, replacement));

        Ok(handle)
    }

    fn remove(&self, patch: PatchHandle) -> Result<()> {
        let mut patches = self.patches.borrow_mut();
        for stack in patches.values_mut() {
            if let Some(pos) = stack.iter().position(|(h, _)| *h == patch) {
                stack.remove(pos);
                return Ok(());
            }
        }
        Err(WeaverError::Patcher(format!("{} is not installed", patch)))
    }

    fn invoke_original(
        &self,
        selector: &Selector,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> Result<Value> {
        let invocation = Invocation {
            receiver: receiver.cloned(),
            args: args.to_vec(),
        };
        self.route(selector, invocation)
    }

    fn current_frame(&self) -> Option<Frame> {
        self.frames.borrow().last().cloned()
    }
}

/// Pops the frame pushed for a call on every exit path
struct FrameGuard<'a> {
    frames: &'a RefCell<Vec<Frame>>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.frames.borrow_mut().pop();
    }
}
