//! HyperSurface label grammar and group nesting.
//!
//! A HyperSurface body is a sequence of labelled sections. Group labels
//! (`Patches 2`) open an ordered collection whose items are brace blocks;
//! field labels (`Triangles 12`) carry a counted payload; inline labels
//! (`InnerRegion Inside`) carry a single value on the label line.
//!
//! The label set is data: [`LabelTable`] maps each label, per scope, to its
//! target. [`HyperGrammar`] derives the token pattern and rescan overlap from
//! the table, and [`NestingTracker`] checks item counts and required fields
//! while the ledger walks the body.

use std::collections::BTreeSet;

use regex::bytes::Regex;

use super::amira::compile;
use super::format::rescan_overlap;
use super::scanner::Token;
use crate::util::{ElementType, Encoding, Error, Result};

/// Where a label may appear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Outside every group
    Top,
    /// Inside an item of the group whose items are named `<base><n>`
    Item(String),
}

/// What a label introduces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A field. `per_item: None` marks an inline value on the label line.
    Field {
        name: String,
        per_item: Option<usize>,
        elem: ElementType,
    },
    /// An ordered collection of items named `<item_base><n>`
    Group { item_base: String },
}

/// One row of the label table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelRule {
    pub label: String,
    pub scope: Scope,
    pub target: Target,
    pub optional: bool,
}

impl LabelRule {
    fn field(label: &str, scope: Scope, per_item: Option<usize>, elem: ElementType, optional: bool) -> Self {
        Self {
            label: label.to_string(),
            scope,
            target: Target::Field { name: label.to_string(), per_item, elem },
            optional,
        }
    }

    fn group(label: &str, item_base: &str, optional: bool) -> Self {
        Self {
            label: label.to_string(),
            scope: Scope::Top,
            target: Target::Group { item_base: item_base.to_string() },
            optional,
        }
    }
}

fn item(base: &str) -> Scope {
    Scope::Item(base.to_string())
}

/// Recognised labels and their meaning per scope.
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    rules: Vec<LabelRule>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The HyperSurface layout from the Amira reference guide.
    pub fn hypersurface() -> Self {
        use ElementType::{Char, Float32, Int32};

        let mut t = Self::new();
        t.push(LabelRule {
            target: Target::Field { name: "Coordinates".into(), per_item: Some(3), elem: Float32 },
            ..LabelRule::field("Vertices", Scope::Top, None, Float32, false)
        });
        t.push(LabelRule::field("Vertices", item("BoundaryCurve"), Some(1), Int32, false));
        t.push(LabelRule::field("NBranchingPoints", Scope::Top, None, Int32, true));
        t.push(LabelRule::field("NVerticesOnCurves", Scope::Top, None, Int32, true));
        t.push(LabelRule::group("BoundaryCurves", "BoundaryCurve", true));
        t.push(LabelRule::field("BoundaryCurves", item("Patch"), Some(1), Int32, true));
        t.push(LabelRule::group("Patches", "Patch", false));
        t.push(LabelRule::field("Patches", item("Surface"), Some(1), Int32, false));
        t.push(LabelRule::field("InnerRegion", item("Patch"), None, Char, false));
        t.push(LabelRule::field("OuterRegion", item("Patch"), None, Char, false));
        t.push(LabelRule::field("Triangles", item("Patch"), Some(3), Int32, false));
        t.push(LabelRule::field("BranchingPoints", item("Patch"), Some(1), Int32, true));
        t.push(LabelRule::group("Surfaces", "Surface", true));
        t.push(LabelRule::field("Region", item("Surface"), None, Char, false));
        t
    }

    pub fn push(&mut self, rule: LabelRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    /// Distinct labels, longest first.
    pub fn labels(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.rules.iter().map(|r| r.label.as_str()).collect();
        let mut labels: Vec<&str> = set.into_iter().collect();
        labels.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        labels
    }

    pub fn max_label_len(&self) -> usize {
        self.rules.iter().map(|r| r.label.len()).max().unwrap_or(0)
    }

    /// Rule for `label` in the given scope.
    pub fn lookup(&self, label: &str, scope: &Scope) -> Option<&LabelRule> {
        self.rules.iter().find(|r| r.label == label && &r.scope == scope)
    }

    /// Labels every item of `item_base` must contain.
    pub fn required(&self, item_base: &str) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|r| !r.optional && matches!(&r.scope, Scope::Item(b) if b == item_base))
            .map(|r| r.label.clone())
            .collect()
    }
}

const WS: &str = r"[ \t\r\f\v]";
const NAME_MAX: usize = 128;
const COUNT_MAX: usize = 20;
const BLANKS_MAX: usize = 16;
const BRACES_MAX: usize = 4;

/// Token patterns derived from a [`LabelTable`].
#[derive(Clone, Debug)]
pub struct HyperGrammar {
    table: LabelTable,
    token: Regex,
    terminator: Regex,
    comments: Option<Regex>,
    max_token_len: usize,
    overlap: usize,
}

impl HyperGrammar {
    pub fn new(table: LabelTable, encoding: Encoding) -> Result<Self> {
        if table.rules().is_empty() {
            return Err(Error::Config("empty label table".into()));
        }
        let labels: Vec<String> = table.labels().iter().map(|l| regex::escape(l)).collect();
        let token = format!(
            r"(?-u)(?:^|\n){ws}{{0,{b}}}(?P<label>{labels})(?:{ws}{{1,{b}}}(?:(?P<count>[0-9]{{1,{c}}})|(?P<name>[A-Za-z0-9_ \t]{{1,{n}}})))?(?P<open>(?:{ws}{{0,{b}}}\n?{ws}{{0,{b}}}\{{){{1,{o}}})?{ws}{{0,{b}}}\n",
            ws = WS,
            b = BLANKS_MAX,
            labels = labels.join("|"),
            c = COUNT_MAX,
            n = NAME_MAX,
            o = BRACES_MAX,
        );
        let terminator = format!(r"(?-u)\}}|(?:^|\n){ws}{{0,{b}}}[A-Za-z]", ws = WS, b = BLANKS_MAX);

        let max_token_len = 1
            + BLANKS_MAX
            + table.max_label_len()
            + BLANKS_MAX
            + NAME_MAX.max(COUNT_MAX)
            + BRACES_MAX * (2 * BLANKS_MAX + 2)
            + BLANKS_MAX
            + 1;
        let overlap = rescan_overlap(max_token_len.max(BLANKS_MAX + 2));

        Ok(Self {
            token: compile(&token)?,
            terminator: compile(&terminator)?,
            comments: if encoding.is_ascii() { Some(compile(r"(?-u)#[^\n]*")?) } else { None },
            table,
            max_token_len,
            overlap,
        })
    }

    pub fn hypersurface(encoding: Encoding) -> Result<Self> {
        Self::new(LabelTable::hypersurface(), encoding)
    }

    pub fn table(&self) -> &LabelTable {
        &self.table
    }

    pub fn token(&self) -> &Regex {
        &self.token
    }

    /// End of an ASCII payload: a closing brace or a line starting with a letter.
    pub fn terminator(&self) -> &Regex {
        &self.terminator
    }

    pub fn comments(&self) -> Option<&Regex> {
        self.comments.as_ref()
    }

    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Value carried on a label line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InlineValue {
    Count(u64),
    Text(String),
}

/// Array a field belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    /// Top-level field: owned by an array named after the label
    TopLevel,
    /// Field of the named group item (`Patch2`)
    Item(String),
}

/// Structural events produced by the [`NestingTracker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    OpenGroup { name: String, count: u64 },
    OpenItem { group: String, name: String, item: u64 },
    CloseGroup { name: String },
    Inline { owner: Owner, label: String, value: InlineValue },
    Payload {
        owner: Owner,
        label: String,
        field: String,
        items: u64,
        per_item: usize,
        elem: ElementType,
    },
}

#[derive(Clone, Debug)]
struct GroupState {
    name: String,
    item_base: String,
    expected: u64,
    item: u64,
    item_open: bool,
    /// Group token had no brace, the first `{` opens item 1
    brace_pending: bool,
    seen: BTreeSet<String>,
}

impl GroupState {
    fn item_name(&self) -> String {
        format!("{}{}", self.item_base, self.item)
    }
}

/// Tracks group nesting across tokens.
///
/// Fed the bytes between tokens (`gap`) and each token in file order. A `}`
/// in the gap closes the current item; a `{` after it opens the next one,
/// otherwise the group ends. A field label repeated inside one item without
/// a brace also starts the next item.
#[derive(Clone, Debug, Default)]
pub struct NestingTracker {
    group: Option<GroupState>,
}

impl NestingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth (0 or 1).
    pub fn depth(&self) -> usize {
        match &self.group {
            Some(g) if g.item_open => 1,
            _ => 0,
        }
    }

    /// Name of the open group item, if any.
    pub fn current_item(&self) -> Option<String> {
        self.group.as_ref().filter(|g| g.item_open).map(GroupState::item_name)
    }

    fn close_item(&mut self, table: &LabelTable) -> Result<()> {
        let Some(g) = self.group.as_mut() else {
            return Err(Error::corrupt("unbalanced '}' outside of any group"));
        };
        if !g.item_open {
            return Err(Error::corrupt(format!("unbalanced '}}' after {} closed", g.item_name())));
        }
        let missing: Vec<String> = table.required(&g.item_base).difference(&g.seen).cloned().collect();
        if !missing.is_empty() {
            return Err(Error::corrupt(format!(
                "{} lacks required field(s) {}",
                g.item_name(),
                missing.join(", ")
            )));
        }
        g.item_open = false;
        Ok(())
    }

    fn open_next_item(&mut self, out: &mut Vec<Directive>) -> Result<()> {
        let Some(g) = self.group.as_mut() else {
            return Err(Error::corrupt("'{' outside of any group"));
        };
        if g.brace_pending {
            g.brace_pending = false;
            return Ok(());
        }
        if g.item_open {
            return Err(Error::corrupt(format!("nested '{{' inside {}", g.item_name())));
        }
        g.item += 1;
        if g.item > g.expected {
            return Err(Error::corrupt(format!(
                "group '{}' declares {} items but item {} follows",
                g.name, g.expected, g.item
            )));
        }
        g.item_open = true;
        g.seen.clear();
        out.push(Directive::OpenItem { group: g.name.clone(), name: g.item_name(), item: g.item });
        Ok(())
    }

    fn end_group_if_closed(&mut self, out: &mut Vec<Directive>) -> Result<()> {
        if let Some(g) = self.group.as_ref().filter(|g| !g.item_open) {
            if g.item < g.expected {
                return Err(Error::corrupt(format!(
                    "group '{}' declares {} items but only {} found",
                    g.name, g.expected, g.item
                )));
            }
            out.push(Directive::CloseGroup { name: g.name.clone() });
            self.group = None;
        }
        Ok(())
    }

    fn apply_gap(&mut self, gap: &[u8], table: &LabelTable, out: &mut Vec<Directive>) -> Result<bool> {
        let mut closed = false;
        for &b in gap {
            match b {
                b'}' => {
                    self.close_item(table)?;
                    closed = true;
                }
                b'{' => self.open_next_item(out)?,
                _ => {}
            }
        }
        self.end_group_if_closed(out)?;
        Ok(closed)
    }

    /// Process the bytes preceding `token`, then the token itself.
    pub fn on_token(&mut self, gap: &[u8], token: &Token, table: &LabelTable) -> Result<Vec<Directive>> {
        let mut out = Vec::new();
        let closed = self.apply_gap(gap, table, &mut out)?;

        let label = token
            .label
            .as_deref()
            .ok_or_else(|| Error::corrupt(format!("token at offset {} has no label", token.start)))?;

        let item_scope = self.group.as_ref().map(|g| (Scope::Item(g.item_base.clone()), g.item_name()));
        let rule = match &item_scope {
            Some((scope, item_name)) => match table.lookup(label, scope) {
                Some(rule) => rule,
                None if matches!(
                    table.lookup(label, &Scope::Top).map(|r| &r.target),
                    Some(Target::Group { .. })
                ) =>
                {
                    return Err(Error::corrupt(format!(
                        "group '{}' opened inside {}: sub groups not supported",
                        label, item_name
                    )));
                }
                None => return Err(Error::corrupt(format!("'{}' not expected in {}", label, item_name))),
            },
            None => table
                .lookup(label, &Scope::Top)
                .ok_or_else(|| Error::corrupt(format!("'{}' not expected outside a group", label)))?,
        };

        let owner = if item_scope.is_some() {
            self.note_field(label, closed, &mut out)?;
            Owner::Item(self.group.as_ref().map(GroupState::item_name).unwrap_or_default())
        } else {
            Owner::TopLevel
        };

        match &rule.target {
            Target::Group { item_base } => {
                let count = token
                    .count
                    .ok_or_else(|| Error::corrupt(format!("item count of group '{}' not readable", label)))?;
                if token.braces > 1 {
                    return Err(Error::corrupt(format!("group '{}': sub groups not supported", label)));
                }
                if count == 0 {
                    if !rule.optional {
                        return Err(Error::corrupt(format!("group '{}' is mandatory", label)));
                    }
                    return Ok(out);
                }
                let state = GroupState {
                    name: label.to_string(),
                    item_base: item_base.clone(),
                    expected: count,
                    item: 1,
                    item_open: true,
                    brace_pending: token.braces == 0,
                    seen: BTreeSet::new(),
                };
                out.push(Directive::OpenGroup { name: label.to_string(), count });
                out.push(Directive::OpenItem { group: label.to_string(), name: state.item_name(), item: 1 });
                self.group = Some(state);
            }
            Target::Field { name, per_item, elem } => {
                if token.braces > 0 {
                    return Err(Error::corrupt(format!("field '{}' followed by '{{'", label)));
                }
                if let Some(g) = self.group.as_mut() {
                    g.brace_pending = false;
                }
                match per_item {
                    Some(per_item) => {
                        let items = token.count.ok_or_else(|| {
                            Error::corrupt(format!("'{}' stream does not provide number of items", label))
                        })?;
                        out.push(Directive::Payload {
                            owner,
                            label: label.to_string(),
                            field: name.clone(),
                            items,
                            per_item: *per_item,
                            elem: *elem,
                        });
                    }
                    None => {
                        let value = match (token.count, &token.name) {
                            (Some(n), _) => InlineValue::Count(n),
                            (None, Some(text)) => InlineValue::Text(text.clone()),
                            (None, None) => InlineValue::Text(String::new()),
                        };
                        out.push(Directive::Inline { owner, label: label.to_string(), value });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Record a field of the open item; a repeat without `}` starts the next item.
    fn note_field(&mut self, label: &str, closed: bool, out: &mut Vec<Directive>) -> Result<()> {
        let repeated = self.group.as_ref().map_or(false, |g| g.seen.contains(label));
        if repeated && !closed {
            let Some(g) = self.group.as_mut() else { return Ok(()) };
            g.item += 1;
            if g.item > g.expected {
                return Err(Error::corrupt(format!(
                    "group '{}' declares {} items but item {} follows",
                    g.name, g.expected, g.item
                )));
            }
            g.seen.clear();
            out.push(Directive::OpenItem { group: g.name.clone(), name: g.item_name(), item: g.item });
        }
        if let Some(g) = self.group.as_mut() {
            g.seen.insert(label.to_string());
        }
        Ok(())
    }

    /// Process trailing bytes at end of source. An item still open is closed.
    pub fn finish(&mut self, gap: &[u8], table: &LabelTable) -> Result<Vec<Directive>> {
        let mut out = Vec::new();
        self.apply_gap(gap, table, &mut out)?;
        if self.group.as_ref().is_some_and(|g| g.item_open) {
            self.close_item(table)?;
            self.end_group_if_closed(&mut out)?;
        }
        Ok(out)
    }
}
