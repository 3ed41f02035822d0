//! Rules, rulesets, and the node tree the engine interprets.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use gridgram_pattern::{expand_pair, parse_rule_text, Pattern, PatternError, Symmetries, Transform};
use std::str::FromStr;

/// How a rule is applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ApplyMode {
    /// Apply one match at a time.
    Single,
    /// Collect every match and apply them as one batch.
    Parallel,
}

impl FromStr for ApplyMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ApplyMode::Single),
            "parallel" => Ok(ApplyMode::Parallel),
            other => Err(EngineError::InvalidRuleMode(other.to_string())),
        }
    }
}

/// The control strategy of a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strategy {
    /// Each child once, in order; single rules run to exhaustion.
    Series,
    /// Passes over the children, one step each, until exhausted.
    Sequence,
    /// Cursor over the children; a productive step re-offers earlier ones.
    Retrace,
    /// Uniformly random child per step until exhausted.
    Random,
}

impl FromStr for Strategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "series" => Ok(Strategy::Series),
            "sequence" => Ok(Strategy::Sequence),
            "retrace" => Ok(Strategy::Retrace),
            "random" => Ok(Strategy::Random),
            other => Err(EngineError::InvalidStrategy(other.to_string())),
        }
    }
}

/// One symmetry variant of a rule: a matched input pattern and the output
/// pattern applied in its place.
///
/// Input and output always have identical extents; the extents differ
/// between variants when rotations are enabled.
#[derive(Debug, Clone)]
pub struct Variant {
    /// The transform that produced this variant.
    pub transform: Transform,
    /// The pattern searched for in the grid.
    pub input: Pattern,
    /// The pattern written over a match. Wildcards leave cells unchanged.
    pub output: Pattern,
}

/// A pattern-rewrite rule: paired input/output variant families plus the
/// per-round exhaustion flag.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Application mode.
    pub mode: ApplyMode,
    variants: Vec<Variant>,
    finished: bool,
}

impl Rule {
    /// Builds a rule from base input/output patterns, expanding both under
    /// the same symmetry flags.
    pub fn new(
        input: &Pattern,
        output: &Pattern,
        mode: ApplyMode,
        sym: Symmetries,
    ) -> Result<Self, PatternError> {
        let variants = expand_pair(input, output, sym)?
            .into_iter()
            .map(|(transform, input, output)| Variant {
                transform,
                input,
                output,
            })
            .collect();
        Ok(Self {
            mode,
            variants,
            finished: false,
        })
    }

    /// Builds a rule from `input=output` mini-language text.
    pub fn parse(text: &str, mode: ApplyMode, sym: Symmetries) -> Result<Self, PatternError> {
        let (input, output) = parse_rule_text(text)?;
        Self::new(&input, &output, mode, sym)
    }

    /// Returns the expanded symmetry variants this rule matches with.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Returns true if the matcher found no further non-no-op matches this
    /// round.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub(crate) fn clear_finished(&mut self) {
        self.finished = false;
    }
}

/// The payload of a ruleset node.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// How children are scheduled.
    pub strategy: Strategy,
    /// Re-enter this node after its body until exhausted. Must be false on
    /// the root.
    pub repeat: bool,
    /// Ordered children, each a rule or a nested ruleset.
    pub children: Vec<Node>,
}

/// Variant payload of a tree node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A leaf rewrite rule.
    Rule(Rule),
    /// An inner node scheduling its children.
    Set(RuleSet),
}

/// A node of the rule tree, carrying the fields rules and rulesets share.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    limit: Option<usize>,
    uses: usize,
    kind: NodeKind,
}

impl Node {
    /// Wraps a rule as a tree leaf with unlimited uses.
    pub fn rule(name: &str, rule: Rule) -> Self {
        Self {
            name: name.to_string(),
            limit: None,
            uses: 0,
            kind: NodeKind::Rule(rule),
        }
    }

    /// Builds a ruleset node with unlimited uses and no repeat.
    pub fn set(name: &str, strategy: Strategy, children: Vec<Node>) -> Self {
        Self {
            name: name.to_string(),
            limit: None,
            uses: 0,
            kind: NodeKind::Set(RuleSet {
                strategy,
                repeat: false,
                children,
            }),
        }
    }

    /// Sets the usage limit; nodes are unlimited by default.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the repeat flag. Has no effect on rule leaves.
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        if let NodeKind::Set(set) = &mut self.kind {
            set.repeat = repeat;
        }
        self
    }

    /// Returns the node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the usage limit, `None` for unlimited.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns how many times this node has been used this run.
    pub fn uses(&self) -> usize {
        self.uses
    }

    /// Returns the node payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn split_mut(&mut self) -> (&mut usize, Option<usize>, &mut NodeKind) {
        (&mut self.uses, self.limit, &mut self.kind)
    }

    /// Returns true while the usage limit has not been reached.
    pub fn limit_unreached(&self) -> bool {
        self.limit.map_or(true, |l| self.uses < l)
    }

    pub(crate) fn increment_uses(&mut self) {
        self.uses += 1;
    }

    /// A rule is finished when the matcher exhausted it this round; a
    /// ruleset is finished when every child is, recursively.
    pub fn is_finished(&self) -> bool {
        match &self.kind {
            NodeKind::Rule(rule) => rule.is_finished(),
            NodeKind::Set(set) => set.children.iter().all(Node::is_finished),
        }
    }

    /// Clears the finished flags of this subtree.
    pub fn clear_finished(&mut self) {
        match &mut self.kind {
            NodeKind::Rule(rule) => rule.clear_finished(),
            NodeKind::Set(set) => {
                for child in &mut set.children {
                    child.clear_finished();
                }
            }
        }
    }

    /// Recursively zeroes usage counters and clears finished flags, bringing
    /// the tree back to its pre-run state.
    pub fn reset_uses(&mut self) {
        self.uses = 0;
        match &mut self.kind {
            NodeKind::Rule(rule) => rule.clear_finished(),
            NodeKind::Set(set) => {
                for child in &mut set.children {
                    child.reset_uses();
                }
            }
        }
    }
}
