//! Connectivity-graph construction for declarative board scripts.
//!
//! A board script resolves [`PartTemplate`]s through a [`catalog::Catalog`],
//! instantiates them into a [`Schematic`], and binds pins together into nets
//! with [`Schematic::connect`]. [`Schematic::finalize`] freezes the graph,
//! re-checks the structural invariants, and hands a read-only [`Finalized`]
//! view to the exporters (`ratsnest-netlist`, `ratsnest-svg`).
//!
//! The model is serialisable with `serde` so a finalized graph can be stored
//! or transferred as JSON.

pub mod catalog;
pub mod error;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use error::SchError;

use crate::catalog::Catalog;

/// Helper type alias – pin, net and library labels are plain UTF-8 strings.
pub type Symbol = String;

/// Reference to a part *template* (type) together with the library that
/// declares it.
///
/// This is **not** an instance – it identifies the *kind* of a part so that
/// different instances of the same template share a single `LibRef`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LibRef {
    pub library: Symbol,
    pub name: Symbol,
}

impl LibRef {
    pub fn new(library: impl Into<Symbol>, name: impl Into<Symbol>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for LibRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.library, self.name)
    }
}

/// One pin declared by a template: the logical name used in scripts plus the
/// physical pin identifier printed on the package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinDef {
    pub name: Symbol,
    pub number: Symbol,
}

/// Immutable description of a component type: identifier, ordered pin list,
/// default footprint. Shared by reference between the catalog and every
/// instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartTemplate {
    pub lib_ref: LibRef,
    pins: Vec<PinDef>,
    pub footprint: Symbol,
}

impl PartTemplate {
    pub fn new(lib_ref: LibRef, footprint: impl Into<Symbol>) -> Self {
        Self {
            lib_ref,
            pins: Vec::new(),
            footprint: footprint.into(),
        }
    }

    /// Builder-style pin declaration; pin order is declaration order.
    pub fn with_pin(mut self, name: impl Into<Symbol>, number: impl Into<Symbol>) -> Self {
        self.pins.push(PinDef {
            name: name.into(),
            number: number.into(),
        });
        self
    }

    pub fn pins(&self) -> &[PinDef] {
        &self.pins
    }

    /// Look a pin up by logical name, falling back to the pin number.
    pub fn pin_index(&self, key: &str) -> Option<usize> {
        self.pins
            .iter()
            .position(|p| p.name == key)
            .or_else(|| self.pins.iter().position(|p| p.number == key))
    }
}

/// Handle to a part instance owned by one [`Schematic`].
///
/// Ids are allocated in creation order and display as `P1`, `P2`, …
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(u32);

impl PartId {
    /// Creation index of the instance inside its schematic.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0 + 1)
    }
}

/// Handle to a net owned by one [`Schematic`]. A `NetId` stays valid across
/// merges: lookups resolve to the surviving net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetId(u32);

/// A (part, pin) endpoint – the unit of net membership. `pin` is the pin's
/// index in the template's declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PinRef {
    pub part: PartId,
    pub pin: usize,
}

/// A concrete placement of a template, with mutable display metadata and a
/// per-pin net binding (at most one net per pin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartInstance {
    id: PartId,
    template: Arc<PartTemplate>,
    value: Option<Symbol>,
    footprint: Option<Symbol>,
    bindings: Vec<Option<NetId>>,
}

impl PartInstance {
    pub fn id(&self) -> PartId {
        self.id
    }

    pub fn template(&self) -> &PartTemplate {
        &self.template
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Footprint override if set, otherwise the template default.
    pub fn footprint(&self) -> &str {
        self.footprint.as_deref().unwrap_or(&self.template.footprint)
    }

    /// Net bound to the given template pin index, if any. After finalize the
    /// stored id is always a surviving net.
    pub fn pin_net(&self, pin: usize) -> Option<NetId> {
        self.bindings.get(pin).copied().flatten()
    }
}

/// A named equivalence class of pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    id: NetId,
    name: Symbol,
    members: Vec<PinRef>,
    merged_into: Option<NetId>,
}

impl Net {
    pub fn id(&self) -> NetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[PinRef] {
        &self.members
    }

    /// True once this net has lost a merge; its name then aliases the
    /// survivor.
    pub fn is_merged(&self) -> bool {
        self.merged_into.is_some()
    }
}

/// The connectivity graph: exclusive owner of all part instances and nets.
///
/// Construction is single-threaded and synchronous; instances and nets are
/// never deleted individually. Consume the graph with [`Schematic::finalize`]
/// to obtain the read-only view the exporters take.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Schematic {
    parts: Vec<PartInstance>,
    nets: Vec<Net>,
    net_names: BTreeMap<Symbol, NetId>,
    anon_counter: u32,
}

impl Schematic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh instance of `template` with all pins unbound.
    pub fn instantiate(&mut self, template: Arc<PartTemplate>) -> PartId {
        let id = PartId(self.parts.len() as u32);
        let bindings = vec![None; template.pins().len()];
        self.parts.push(PartInstance {
            id,
            template,
            value: None,
            footprint: None,
            bindings,
        });
        id
    }

    /// Resolve `library:name` through `catalog` and instantiate the result.
    pub fn instantiate_from(
        &mut self,
        catalog: &dyn Catalog,
        library: &str,
        name: &str,
    ) -> Result<PartId, SchError> {
        let template = catalog.resolve(library, name)?;
        Ok(self.instantiate(template))
    }

    /// Clone an existing instance: shares the template, copies value and
    /// footprint override, starts with every pin unbound. Connections are
    /// never copied.
    pub fn clone_part(&mut self, src: PartId) -> Result<PartId, SchError> {
        let src = self.part(src)?;
        let (template, value, footprint) =
            (Arc::clone(&src.template), src.value.clone(), src.footprint.clone());
        let id = PartId(self.parts.len() as u32);
        let bindings = vec![None; template.pins().len()];
        self.parts.push(PartInstance {
            id,
            template,
            value,
            footprint,
            bindings,
        });
        Ok(id)
    }

    /// Overwrite the display value of an instance.
    pub fn set_value(&mut self, part: PartId, value: impl Into<Symbol>) -> Result<(), SchError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SchError::EmptyLabel {
                part: part.to_string(),
                field: "value",
            });
        }
        self.part_mut(part)?.value = Some(value);
        Ok(())
    }

    /// Overwrite the footprint of an instance.
    pub fn set_footprint(
        &mut self,
        part: PartId,
        footprint: impl Into<Symbol>,
    ) -> Result<(), SchError> {
        let footprint = footprint.into();
        if footprint.is_empty() {
            return Err(SchError::EmptyLabel {
                part: part.to_string(),
                field: "footprint",
            });
        }
        self.part_mut(part)?.footprint = Some(footprint);
        Ok(())
    }

    /// Get-or-create the net with this (case-sensitive) name. A name that
    /// lost a merge resolves to its survivor.
    pub fn named_net(&mut self, name: impl Into<Symbol>) -> NetId {
        let name = name.into();
        if let Some(&id) = self.net_names.get(&name) {
            return self.resolve(id);
        }
        self.alloc_net(name)
    }

    /// Create a net with a generated unique name (`N$1`, `N$2`, …), for
    /// connections that have no semantic name.
    pub fn anonymous_net(&mut self) -> NetId {
        loop {
            self.anon_counter += 1;
            let name = format!("N${}", self.anon_counter);
            if !self.net_names.contains_key(&name) {
                return self.alloc_net(name);
            }
        }
    }

    fn alloc_net(&mut self, name: Symbol) -> NetId {
        let id = NetId(self.nets.len() as u32);
        self.net_names.insert(name.clone(), id);
        self.nets.push(Net {
            id,
            name,
            members: Vec::new(),
            merged_into: None,
        });
        id
    }

    /// Bind `pin` of `part` to `net`.
    ///
    /// A pin already bound to a different net is not rebound: the two nets
    /// merge instead, since one pin is one electrical node even when it is
    /// declared through two statements. The survivor of a merge is the
    /// first-declared net; the losing name stays resolvable as an alias.
    /// The call is atomic: on error the graph is unchanged.
    pub fn connect(&mut self, net: NetId, part: PartId, pin: &str) -> Result<(), SchError> {
        let target = self.check_net(net)?;
        let inst = self.part(part)?;
        let pin_ix = inst
            .template
            .pin_index(pin)
            .ok_or_else(|| SchError::UnknownPin {
                part: part.to_string(),
                pin: pin.to_string(),
            })?;
        match self.parts[part.0 as usize].bindings[pin_ix] {
            Some(bound) => {
                let bound = self.resolve(bound);
                if bound != target {
                    self.merge(bound, target);
                }
            }
            None => {
                self.parts[part.0 as usize].bindings[pin_ix] = Some(target);
                self.nets[target.0 as usize].members.push(PinRef { part, pin: pin_ix });
            }
        }
        Ok(())
    }

    /// Fan one net out to several pins, applying the pairwise rule left to
    /// right.
    pub fn connect_all(&mut self, net: NetId, pins: &[(PartId, &str)]) -> Result<(), SchError> {
        for &(part, pin) in pins {
            self.connect(net, part, pin)?;
        }
        Ok(())
    }

    /// Wire a two-pin part between two nets: first template pin to `left`,
    /// second to `right`. Models the series idiom of board scripts
    /// (`vcc & cap & gnd`).
    pub fn series(&mut self, left: NetId, part: PartId, right: NetId) -> Result<(), SchError> {
        let inst = self.part(part)?;
        if inst.template.pins().len() != 2 {
            return Err(SchError::NotTwoPin {
                part: part.to_string(),
                pins: inst.template.pins().len(),
            });
        }
        let first = inst.template.pins()[0].name.clone();
        let second = inst.template.pins()[1].name.clone();
        self.connect(left, part, &first)?;
        self.connect(right, part, &second)
    }

    /// Shared access to an instance.
    pub fn part(&self, id: PartId) -> Result<&PartInstance, SchError> {
        self.parts.get(id.0 as usize).ok_or(SchError::ForeignId {
            kind: "part",
            id: id.0,
        })
    }

    fn part_mut(&mut self, id: PartId) -> Result<&mut PartInstance, SchError> {
        self.parts.get_mut(id.0 as usize).ok_or(SchError::ForeignId {
            kind: "part",
            id: id.0,
        })
    }

    /// Shared access to a net, resolving merge aliases.
    pub fn net(&self, id: NetId) -> Result<&Net, SchError> {
        let id = self.check_net(id)?;
        Ok(&self.nets[id.0 as usize])
    }

    fn check_net(&self, id: NetId) -> Result<NetId, SchError> {
        if (id.0 as usize) < self.nets.len() {
            Ok(self.resolve(id))
        } else {
            Err(SchError::ForeignId {
                kind: "net",
                id: id.0,
            })
        }
    }

    fn resolve(&self, mut id: NetId) -> NetId {
        while let Some(next) = self.nets[id.0 as usize].merged_into {
            id = next;
        }
        id
    }

    fn merge(&mut self, a: NetId, b: NetId) {
        // First-declared net wins, so regenerated netlists diff cleanly.
        let (survivor, loser) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        log::debug!(
            "merging net `{}` into `{}`",
            self.nets[loser.0 as usize].name,
            self.nets[survivor.0 as usize].name
        );
        let members = std::mem::take(&mut self.nets[loser.0 as usize].members);
        self.nets[survivor.0 as usize].members.extend(members);
        self.nets[loser.0 as usize].merged_into = Some(survivor);
    }

    /// Freeze the graph for export.
    ///
    /// Canonicalises merged net ids, re-checks the structural invariants
    /// (fatal on violation), and collects the non-fatal findings: dangling
    /// pins and singleton nets. Findings are logged at `warn` level and
    /// returned alongside the read-only view; they never block export.
    pub fn finalize(mut self) -> Result<Finalized, SchError> {
        // Every stored id points at a surviving net afterwards.
        for part in &mut self.parts {
            for binding in &mut part.bindings {
                if let Some(id) = *binding {
                    let mut id = id;
                    while let Some(next) = self.nets[id.0 as usize].merged_into {
                        id = next;
                    }
                    *binding = Some(id);
                }
            }
        }
        let resolved: BTreeMap<Symbol, NetId> = self
            .net_names
            .iter()
            .map(|(name, &id)| (name.clone(), self.resolve(id)))
            .collect();
        self.net_names = resolved;
        // Members in export order: instance creation index, then template
        // pin declaration order.
        for net in &mut self.nets {
            net.members.sort_unstable();
        }

        // I2: every membership refers to a pin this schematic owns.
        for net in self.nets.iter().filter(|n| !n.is_merged()) {
            for member in &net.members {
                let part = self
                    .parts
                    .get(member.part.0 as usize)
                    .ok_or(SchError::ForeignId {
                        kind: "part",
                        id: member.part.0,
                    })?;
                if member.pin >= part.template.pins().len() {
                    return Err(SchError::ForeignId {
                        kind: "pin",
                        id: member.pin as u32,
                    });
                }
            }
        }

        // I1: structurally guaranteed by `connect`, re-verified here.
        let mut seen: BTreeMap<PinRef, NetId> = BTreeMap::new();
        for net in self.nets.iter().filter(|n| !n.is_merged()) {
            for member in &net.members {
                if let Some(prev) = seen.insert(*member, net.id) {
                    return Err(SchError::PinConflict {
                        part: member.part.to_string(),
                        pin: self.parts[member.part.0 as usize].template.pins()[member.pin]
                            .name
                            .clone(),
                        first: self.nets[prev.0 as usize].name.clone(),
                        second: net.name.clone(),
                    });
                }
            }
        }

        let mut findings = Vec::new();
        for part in &self.parts {
            for (pin_ix, binding) in part.bindings.iter().enumerate() {
                if binding.is_none() {
                    findings.push(Finding::DanglingPin {
                        part: part.id.to_string(),
                        pin: part.template.pins()[pin_ix].name.clone(),
                    });
                }
            }
        }
        for net in self.nets.iter().filter(|n| !n.is_merged()) {
            if net.members.len() == 1 {
                findings.push(Finding::SingletonNet {
                    net: net.name.clone(),
                });
            }
        }
        for finding in &findings {
            log::warn!("{finding}");
        }

        Ok(Finalized {
            sch: self,
            findings,
        })
    }
}

/// Non-fatal validation finding reported by [`Schematic::finalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Finding {
    /// A template-declared pin with no net binding. Floating pins are legal
    /// (unused address lines and the like), so this is only reported.
    DanglingPin { part: String, pin: Symbol },
    /// A net with exactly one member pin, usually an incomplete connection.
    SingletonNet { net: Symbol },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DanglingPin { part, pin } => {
                write!(f, "dangling pin: {part}.{pin} has no net")
            }
            Finding::SingletonNet { net } => {
                write!(f, "singleton net: `{net}` has a single member")
            }
        }
    }
}

/// Read-only view of a finalized [`Schematic`] plus the findings collected
/// during validation.
///
/// No mutation API survives finalization, so exporters may read this
/// concurrently without locking.
#[derive(Debug, Serialize)]
pub struct Finalized {
    sch: Schematic,
    findings: Vec<Finding>,
}

impl Finalized {
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// All instances in creation order.
    pub fn parts(&self) -> &[PartInstance] {
        &self.sch.parts
    }

    /// Surviving nets in creation order, members sorted for export.
    pub fn nets(&self) -> impl Iterator<Item = &Net> {
        self.sch.nets.iter().filter(|n| !n.is_merged())
    }

    /// Look a net up by name, resolving merge aliases.
    pub fn net_named(&self, name: &str) -> Option<&Net> {
        let id = self.sch.net_names.get(name)?;
        Some(&self.sch.nets[id.0 as usize])
    }

    pub fn part(&self, id: PartId) -> Option<&PartInstance> {
        self.sch.parts.get(id.0 as usize)
    }

    /// Logical pin name of a member endpoint, or `None` for a `PinRef` this
    /// graph does not own. Members yielded by [`Finalized::nets`] always
    /// resolve.
    pub fn pin_name(&self, member: PinRef) -> Option<&str> {
        let part = self.sch.parts.get(member.part.0 as usize)?;
        Some(part.template.pins.get(member.pin)?.name.as_str())
    }

    /// Deterministic JSON rendition of the finalized graph.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
