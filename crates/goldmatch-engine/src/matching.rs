//! Cell equality and one-to-one row matching
//!
//! Rows are matched as multisets: every candidate row must pair with a
//! distinct gold row. Numeric tolerance makes cell equality non-transitive,
//! so hashing whole rows is not enough. Instead rows are bucketed by the
//! non-numeric part of their signature (which equality must preserve) and
//! each bucket is resolved by a sorted sweep or, failing that, a maximum
//! flow over classes of identical rows.

use goldmatch_core::{TextNormalization, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// Cell equality rules derived from a policy
#[derive(Debug, Clone, Copy)]
pub struct CellRules<'a> {
    /// Absolute numeric tolerance
    pub tolerance: f64,

    /// Text normalization
    pub text: &'a TextNormalization,
}

impl<'a> CellRules<'a> {
    pub fn new(tolerance: f64, text: &'a TextNormalization) -> Self {
        Self { tolerance, text }
    }

    /// Compare two cells
    ///
    /// Numbers (including numeric text) compare within tolerance, nulls
    /// equal nulls, other text compares after normalization. Every other
    /// pairing is unequal.
    pub fn cells_equal(&self, candidate: &Value, gold: &Value) -> bool {
        if let (Some(a), Some(b)) = (candidate.as_number(), gold.as_number()) {
            return (a - b).abs() <= self.tolerance;
        }

        match (candidate, gold) {
            (Value::Null, Value::Null) => true,
            (Value::Text(a), Value::Text(b)) => {
                candidate.as_number().is_none()
                    && gold.as_number().is_none()
                    && self.text.apply(a) == self.text.apply(b)
            }
            _ => false,
        }
    }

    /// Index of the first differing cell, if any
    ///
    /// Rows are assumed to have equal width.
    pub fn first_difference(&self, candidate: &[Value], gold: &[Value]) -> Option<usize> {
        candidate
            .iter()
            .zip(gold)
            .position(|(c, g)| !self.cells_equal(c, g))
    }

    /// Compare two rows position by position
    pub fn rows_equal(&self, candidate: &[Value], gold: &[Value]) -> bool {
        candidate.len() == gold.len() && self.first_difference(candidate, gold).is_none()
    }

    fn signature<'v>(&self, row: &'v [Value]) -> Vec<CellClass<'v>> {
        row.iter()
            .map(|value| match value {
                Value::Null => CellClass::Null,
                Value::Number(_) => CellClass::Numeric,
                Value::Text(_) if value.as_number().is_some() => CellClass::Numeric,
                Value::Text(s) => CellClass::Text(self.text.apply(s)),
            })
            .collect()
    }
}

/// Equality-preserving class of a cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellClass<'v> {
    Null,
    Numeric,
    Text(Cow<'v, str>),
}

/// Rows that share a signature
#[derive(Default)]
struct Bucket {
    candidate: Vec<usize>,
    gold: Vec<usize>,
}

/// Row comparisons allowed when linking row classes
const PAIR_CHECK_BUDGET: usize = 1 << 22;

/// Edge visits allowed while solving the class-level flow
const FLOW_STEP_BUDGET: usize = 1 << 24;

/// Multiset comparison of two row collections
///
/// Returns `None` when every candidate row pairs one-to-one with an equal
/// gold row, otherwise the lowest index of a gold row left without a partner.
/// Callers must check row counts first.
///
/// Buckets with at most one numeric column are decided exactly by a sorted
/// greedy sweep. Wider buckets try a sorted pass, then a maximum flow over
/// classes of identical rows. The flow is bounded; a bucket that exhausts
/// the bound is reported as unmatched at the row the sorted pass stopped on.
pub fn unmatched_gold_row(
    rules: &CellRules<'_>,
    candidate: &[Vec<Value>],
    gold: &[Vec<Value>],
) -> Option<usize> {
    let mut buckets: HashMap<Vec<CellClass<'_>>, Bucket> = HashMap::new();

    for (index, row) in candidate.iter().enumerate() {
        buckets.entry(rules.signature(row)).or_default().candidate.push(index);
    }
    for (index, row) in gold.iter().enumerate() {
        buckets.entry(rules.signature(row)).or_default().gold.push(index);
    }

    buckets
        .iter()
        .filter_map(|(signature, bucket)| {
            let numeric: Vec<usize> = signature
                .iter()
                .enumerate()
                .filter(|(_, class)| **class == CellClass::Numeric)
                .map(|(position, _)| position)
                .collect();
            unmatched_in_bucket(rules, candidate, gold, bucket, &numeric)
        })
        .min()
}

fn unmatched_in_bucket(
    rules: &CellRules<'_>,
    candidate: &[Vec<Value>],
    gold: &[Vec<Value>],
    bucket: &Bucket,
    numeric: &[usize],
) -> Option<usize> {
    if bucket.candidate.len() < bucket.gold.len() {
        return bucket.gold.get(bucket.candidate.len()).copied();
    }
    if bucket.candidate.len() > bucket.gold.len() {
        // Some other bucket is then short of candidate rows; report nothing here
        return None;
    }

    match numeric {
        // Same signature without numbers means identical rows
        [] => None,
        [column] => line_matching(rules, candidate, gold, bucket, *column),
        _ => {
            let stuck = sorted_pass(rules, candidate, gold, bucket)?;
            class_matching(
                rules,
                candidate,
                gold,
                bucket,
                numeric,
                PAIR_CHECK_BUDGET,
                FLOW_STEP_BUDGET,
            )
            .unwrap_or(Some(stuck))
        }
    }
}

/// Pair rows after sorting both sides by their numeric cells
///
/// Returns the gold row of the first pair that differs. Cheap and usually
/// sufficient; a failure here is not conclusive.
fn sorted_pass(
    rules: &CellRules<'_>,
    candidate: &[Vec<Value>],
    gold: &[Vec<Value>],
    bucket: &Bucket,
) -> Option<usize> {
    let mut cand = bucket.candidate.clone();
    let mut gold_rows = bucket.gold.clone();
    cand.sort_by(|&a, &b| numeric_order(&candidate[a], &candidate[b]));
    gold_rows.sort_by(|&a, &b| numeric_order(&gold[a], &gold[b]));

    cand.iter()
        .zip(&gold_rows)
        .find(|&(&c, &g)| !rules.rows_equal(&candidate[c], &gold[g]))
        .map(|(_, &g)| g)
}

fn numeric_order(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| numeric_key(x).total_cmp(&numeric_key(y)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn numeric_key(value: &Value) -> f64 {
    value.as_number().unwrap_or(f64::NAN)
}

/// Exact matching for rows that differ in a single numeric column
///
/// Every gold value accepts the same width of window, so sweeping both
/// sides in ascending order and giving each gold value the smallest
/// candidate still inside its window yields a maximum matching.
fn line_matching(
    rules: &CellRules<'_>,
    candidate: &[Vec<Value>],
    gold: &[Vec<Value>],
    bucket: &Bucket,
    column: usize,
) -> Option<usize> {
    let tolerance = rules.tolerance;

    let mut cand: Vec<f64> = bucket
        .candidate
        .iter()
        .map(|&c| numeric_key(&candidate[c][column]))
        .filter(|v| !v.is_nan())
        .collect();
    cand.sort_by(f64::total_cmp);

    let mut gold_values: Vec<(f64, usize)> = bucket
        .gold
        .iter()
        .map(|&g| (numeric_key(&gold[g][column]), g))
        .collect();
    gold_values.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut next = 0;
    let mut unmatched: Option<usize> = None;
    for (value, index) in gold_values {
        // Candidates left below this window are below every later one too
        while next < cand.len() && cand[next] < value && value - cand[next] > tolerance {
            next += 1;
        }
        if next < cand.len() && (cand[next] - value).abs() <= tolerance {
            next += 1;
        } else {
            unmatched = Some(unmatched.map_or(index, |u| u.min(index)));
        }
    }
    unmatched
}

/// Rows of one side whose numeric cells are bit-for-bit identical
struct RowClass {
    /// First numeric cell, used to window candidate lookups
    key: f64,
    rows: Vec<usize>,
}

fn row_classes(rows: &[Vec<Value>], members: &[usize], numeric: &[usize]) -> Vec<RowClass> {
    let mut index: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut classes: Vec<RowClass> = Vec::new();

    for &member in members {
        let bits: Vec<u64> = numeric
            .iter()
            .map(|&p| {
                let v = numeric_key(&rows[member][p]);
                // -0.0 and 0.0 compare equal
                let v = if v == 0.0 { 0.0 } else { v };
                v.to_bits()
            })
            .collect();
        match index.entry(bits) {
            Entry::Occupied(slot) => classes[*slot.get()].rows.push(member),
            Entry::Vacant(slot) => {
                slot.insert(classes.len());
                classes.push(RowClass {
                    key: numeric_key(&rows[member][numeric[0]]),
                    rows: vec![member],
                });
            }
        }
    }
    classes
}

/// Work bound reached before a verdict
#[derive(Debug, PartialEq)]
struct Exhausted;

fn spend(budget: &mut usize) -> Result<(), Exhausted> {
    *budget = budget.checked_sub(1).ok_or(Exhausted)?;
    Ok(())
}

/// Maximum matching between classes of identical rows
///
/// Identical rows are interchangeable, so the row-level matching reduces
/// to a flow from gold classes to candidate classes with capacities equal
/// to class sizes. Candidate classes are windowed on their first numeric
/// cell before any row comparison.
fn class_matching(
    rules: &CellRules<'_>,
    candidate: &[Vec<Value>],
    gold: &[Vec<Value>],
    bucket: &Bucket,
    numeric: &[usize],
    mut pair_checks: usize,
    mut flow_steps: usize,
) -> Result<Option<usize>, Exhausted> {
    let tolerance = rules.tolerance;
    let gold_classes = row_classes(gold, &bucket.gold, numeric);
    let mut cand_classes = row_classes(candidate, &bucket.candidate, numeric);
    cand_classes.retain(|c| !c.key.is_nan());
    cand_classes.sort_by(|a, b| a.key.total_cmp(&b.key));

    let source = 0;
    let sink = 1;
    let gold_node = |g: usize| 2 + g;
    let cand_node = |c: usize| 2 + gold_classes.len() + c;

    let mut network = FlowNetwork::new(2 + gold_classes.len() + cand_classes.len());
    let mut supply = Vec::with_capacity(gold_classes.len());
    for (g, class) in gold_classes.iter().enumerate() {
        supply.push(network.add_edge(source, gold_node(g), class.rows.len()));
    }
    for (c, class) in cand_classes.iter().enumerate() {
        network.add_edge(cand_node(c), sink, class.rows.len());
    }

    for (g, class) in gold_classes.iter().enumerate() {
        let key = class.key;
        if key.is_nan() {
            continue;
        }
        let lo = cand_classes.partition_point(|c| c.key < key && key - c.key > tolerance);
        let hi = cand_classes.partition_point(|c| c.key <= key || c.key - key <= tolerance);
        let representative = &gold[class.rows[0]];

        for (offset, other) in cand_classes[lo..hi.max(lo)].iter().enumerate() {
            spend(&mut pair_checks)?;
            if rules.rows_equal(&candidate[other.rows[0]], representative) {
                let capacity = class.rows.len().min(other.rows.len());
                network.add_edge(gold_node(g), cand_node(lo + offset), capacity);
            }
        }
    }

    network.max_flow(source, sink, &mut flow_steps)?;

    Ok(gold_classes
        .iter()
        .zip(&supply)
        .filter_map(|(class, &edge)| class.rows.get(network.flow(edge)).copied())
        .min())
}

/// Residual network for Dinic's maximum flow
///
/// Edges are stored in pairs; `edge ^ 1` is the reverse of `edge`.
struct FlowNetwork {
    adjacency: Vec<Vec<usize>>,
    target: Vec<usize>,
    capacity: Vec<usize>,
}

impl FlowNetwork {
    fn new(nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); nodes],
            target: Vec::new(),
            capacity: Vec::new(),
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, capacity: usize) -> usize {
        let edge = self.target.len();
        self.target.push(to);
        self.capacity.push(capacity);
        self.adjacency[from].push(edge);
        self.target.push(from);
        self.capacity.push(0);
        self.adjacency[to].push(edge + 1);
        edge
    }

    /// Flow currently carried by an edge
    fn flow(&self, edge: usize) -> usize {
        self.capacity[edge ^ 1]
    }

    fn max_flow(
        &mut self,
        source: usize,
        sink: usize,
        budget: &mut usize,
    ) -> Result<usize, Exhausted> {
        let mut total = 0;
        while let Some(mut level) = self.levels(source, sink, budget)? {
            let mut next = vec![0; self.adjacency.len()];
            loop {
                let pushed = self.push_path(source, sink, &mut level, &mut next, budget)?;
                if pushed == 0 {
                    break;
                }
                total += pushed;
            }
        }
        Ok(total)
    }

    /// Breadth-first levels over edges with spare capacity
    fn levels(
        &self,
        source: usize,
        sink: usize,
        budget: &mut usize,
    ) -> Result<Option<Vec<Option<usize>>>, Exhausted> {
        let mut level = vec![None; self.adjacency.len()];
        level[source] = Some(0);
        let mut queue = VecDeque::from([source]);

        while let Some(node) = queue.pop_front() {
            for &edge in &self.adjacency[node] {
                spend(budget)?;
                let to = self.target[edge];
                if self.capacity[edge] > 0 && level[to].is_none() {
                    level[to] = level[node].map(|l| l + 1);
                    queue.push_back(to);
                }
            }
        }

        Ok(level[sink].is_some().then_some(level))
    }

    /// Push flow along one shortest augmenting path
    ///
    /// Returns 0 once the level graph has no path left.
    fn push_path(
        &mut self,
        source: usize,
        sink: usize,
        level: &mut [Option<usize>],
        next: &mut [usize],
        budget: &mut usize,
    ) -> Result<usize, Exhausted> {
        let mut path: Vec<usize> = Vec::new();
        let mut node = source;

        loop {
            if node == sink {
                let pushed = path.iter().map(|&e| self.capacity[e]).min().unwrap_or(0);
                for &edge in &path {
                    self.capacity[edge] -= pushed;
                    self.capacity[edge ^ 1] += pushed;
                }
                return Ok(pushed);
            }

            let mut advanced = false;
            while next[node] < self.adjacency[node].len() {
                spend(budget)?;
                let edge = self.adjacency[node][next[node]];
                let to = self.target[edge];
                if self.capacity[edge] > 0
                    && level[to].is_some()
                    && level[to] == level[node].map(|l| l + 1)
                {
                    path.push(edge);
                    node = to;
                    advanced = true;
                    break;
                }
                next[node] += 1;
            }

            if !advanced {
                // Dead end for the rest of this phase
                level[node] = None;
                match path.pop() {
                    None => return Ok(0),
                    Some(edge) => {
                        node = self.target[edge ^ 1];
                        next[node] += 1;
                    }
                }
            }
        }
    }
}
