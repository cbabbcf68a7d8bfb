//! CDCL SAT solver
//!
//! MiniSat-style core:
//! - two watched literals per clause
//! - first-UIP conflict analysis with VSIDS activities and phase saving
//! - Luby restarts
//! - solving under assumptions; a failed run reports the subset of
//!   assumptions responsible (`analyze_final`)
//!
//! Learnt clauses are never deleted: queries are short-lived and bounded
//! by a conflict budget.

use std::ops::Not;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub u32);

impl Var {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Literal encoded as `2 * var + negated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    #[inline]
    pub fn new(var: Var, negated: bool) -> Self {
        Lit((var.0 << 1) | u32::from(negated))
    }

    #[inline]
    pub fn positive(var: Var) -> Self {
        Lit::new(var, false)
    }

    #[inline]
    pub fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    #[inline]
    pub fn is_negated(self) -> bool {
        self.0 & 1 == 1
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LBool {
    True,
    False,
    Undef,
}

#[inline]
fn lit_value(assigns: &[LBool], lit: Lit) -> LBool {
    match assigns[lit.var().index()] {
        LBool::Undef => LBool::Undef,
        LBool::True if lit.is_negated() => LBool::False,
        LBool::False if lit.is_negated() => LBool::True,
        value => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ConflictLimit(u64),
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    Sat,
    /// Negations of the assumptions that together cause unsatisfiability
    /// (empty when the clauses alone are unsatisfiable)
    Unsat { failed: Vec<Lit> },
    Unknown(StopReason),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SatLimits {
    pub conflict_limit: Option<u64>,
    pub deadline: Option<Instant>,
}

const RESTART_BASE: u64 = 100;
const VAR_DECAY: f64 = 0.95;
const RESCALE_LIMIT: f64 = 1e100;

/// Binary max-heap of variables ordered by activity
#[derive(Debug, Default)]
struct VarHeap {
    heap: Vec<u32>,
    position: Vec<Option<usize>>,
}

impl VarHeap {
    fn grow(&mut self) {
        self.position.push(None);
    }

    fn contains(&self, v: u32) -> bool {
        self.position[v as usize].is_some()
    }

    fn insert(&mut self, v: u32, activity: &[f64]) {
        if self.contains(v) {
            return;
        }
        self.position[v as usize] = Some(self.heap.len());
        self.heap.push(v);
        self.sift_up(self.heap.len() - 1, activity);
    }

    fn pop(&mut self, activity: &[f64]) -> Option<u32> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        self.position[top as usize] = None;
        if !self.heap.is_empty() {
            self.position[self.heap[0] as usize] = Some(0);
            self.sift_down(0, activity);
        }
        Some(top)
    }

    fn bumped(&mut self, v: u32, activity: &[f64]) {
        if let Some(pos) = self.position[v as usize] {
            self.sift_up(pos, activity);
        }
    }

    fn sift_up(&mut self, mut pos: usize, activity: &[f64]) {
        let v = self.heap[pos];
        while pos > 0 {
            let parent = (pos - 1) / 2;
            let p = self.heap[parent];
            if activity[p as usize] >= activity[v as usize] {
                break;
            }
            self.heap[pos] = p;
            self.position[p as usize] = Some(pos);
            pos = parent;
        }
        self.heap[pos] = v;
        self.position[v as usize] = Some(pos);
    }

    fn sift_down(&mut self, mut pos: usize, activity: &[f64]) {
        let v = self.heap[pos];
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len
                && activity[self.heap[right] as usize] > activity[self.heap[left] as usize]
            {
                right
            } else {
                left
            };
            let c = self.heap[child];
            if activity[c as usize] <= activity[v as usize] {
                break;
            }
            self.heap[pos] = c;
            self.position[c as usize] = Some(pos);
            pos = child;
        }
        self.heap[pos] = v;
        self.position[v as usize] = Some(pos);
    }
}

#[derive(Debug)]
pub struct SatSolver {
    clauses: Vec<Vec<Lit>>,
    /// `watches[l]`: clauses watching `l`, visited when `l` becomes false
    watches: Vec<Vec<u32>>,
    assigns: Vec<LBool>,
    level: Vec<u32>,
    reason: Vec<Option<u32>>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    activity: Vec<f64>,
    var_inc: f64,
    heap: VarHeap,
    polarity: Vec<bool>,
    seen: Vec<bool>,
    model: Vec<bool>,
    ok: bool,
    conflicts: u64,
}

impl Default for SatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SatSolver {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
            watches: Vec::new(),
            assigns: Vec::new(),
            level: Vec::new(),
            reason: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: Vec::new(),
            var_inc: 1.0,
            heap: VarHeap::default(),
            polarity: Vec::new(),
            seen: Vec::new(),
            model: Vec::new(),
            ok: true,
            conflicts: 0,
        }
    }

    pub fn new_var(&mut self) -> Var {
        let v = Var(self.assigns.len() as u32);
        self.watches.push(Vec::new());
        self.watches.push(Vec::new());
        self.assigns.push(LBool::Undef);
        self.level.push(0);
        self.reason.push(None);
        self.activity.push(0.0);
        self.polarity.push(false);
        self.seen.push(false);
        self.heap.grow();
        self.heap.insert(v.0, &self.activity);
        v
    }

    pub fn num_vars(&self) -> usize {
        self.assigns.len()
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    /// Value of `lit` in the last satisfying assignment
    pub fn model_value(&self, lit: Lit) -> bool {
        let value = self.model.get(lit.var().index()).copied().unwrap_or(false);
        value != lit.is_negated()
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    fn value(&self, lit: Lit) -> LBool {
        lit_value(&self.assigns, lit)
    }

    /// Add a clause at decision level 0. Returns `false` once the clause
    /// set is known to be unsatisfiable.
    pub fn add_clause(&mut self, lits: &[Lit]) -> bool {
        if !self.ok {
            return false;
        }
        self.cancel_until(0);
        let mut lits = lits.to_vec();
        lits.sort_unstable();
        lits.dedup();
        if lits.windows(2).any(|w| w[0] == !w[1]) {
            return true;
        }
        if lits.iter().any(|l| self.value(*l) == LBool::True) {
            return true;
        }
        lits.retain(|l| self.value(*l) != LBool::False);
        match lits.len() {
            0 => {
                self.ok = false;
            }
            1 => {
                self.enqueue(lits[0], None);
                self.ok = self.propagate().is_none();
            }
            _ => {
                self.attach(lits);
            }
        }
        self.ok
    }

    fn attach(&mut self, lits: Vec<Lit>) -> u32 {
        let cref = self.clauses.len() as u32;
        self.watches[lits[0].index()].push(cref);
        self.watches[lits[1].index()].push(cref);
        self.clauses.push(lits);
        cref
    }

    fn enqueue(&mut self, lit: Lit, reason: Option<u32>) {
        let v = lit.var().index();
        self.assigns[v] = if lit.is_negated() {
            LBool::False
        } else {
            LBool::True
        };
        self.level[v] = self.decision_level() as u32;
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    fn propagate(&mut self) -> Option<u32> {
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            let false_lit = !p;
            let mut ws = std::mem::take(&mut self.watches[false_lit.index()]);
            let (mut i, mut j) = (0, 0);
            let mut conflict = None;

            while i < ws.len() {
                let cref = ws[i];
                i += 1;
                let clause = &mut self.clauses[cref as usize];
                if clause[0] == false_lit {
                    clause.swap(0, 1);
                }
                let first = clause[0];
                if lit_value(&self.assigns, first) == LBool::True {
                    ws[j] = cref;
                    j += 1;
                    continue;
                }
                let mut moved = false;
                for k in 2..clause.len() {
                    if lit_value(&self.assigns, clause[k]) != LBool::False {
                        clause.swap(1, k);
                        self.watches[clause[1].index()].push(cref);
                        moved = true;
                        break;
                    }
                }
                if moved {
                    continue;
                }
                ws[j] = cref;
                j += 1;
                if lit_value(&self.assigns, first) == LBool::False {
                    conflict = Some(cref);
                    while i < ws.len() {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                    self.qhead = self.trail.len();
                } else {
                    self.enqueue(first, Some(cref));
                }
            }
            ws.truncate(j);
            self.watches[false_lit.index()] = ws;
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    fn bump(&mut self, v: Var) {
        self.activity[v.index()] += self.var_inc;
        if self.activity[v.index()] > RESCALE_LIMIT {
            for a in &mut self.activity {
                *a *= 1.0 / RESCALE_LIMIT;
            }
            self.var_inc *= 1.0 / RESCALE_LIMIT;
        }
        self.heap.bumped(v.0, &self.activity);
    }

    /// First-UIP learning; returns the learnt clause (asserting literal
    /// first) and the backtrack level
    fn analyze(&mut self, mut confl: u32) -> (Vec<Lit>, usize) {
        let mut learnt = vec![Lit(0)];
        let mut path_count = 0usize;
        let mut uip: Option<Lit> = None;
        let mut index = self.trail.len();
        let current = self.decision_level() as u32;

        loop {
            let start = usize::from(uip.is_some());
            let len = self.clauses[confl as usize].len();
            for k in start..len {
                let q = self.clauses[confl as usize][k];
                let v = q.var().index();
                if !self.seen[v] && self.level[v] > 0 {
                    self.bump(q.var());
                    self.seen[v] = true;
                    if self.level[v] >= current {
                        path_count += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }
            loop {
                index -= 1;
                if self.seen[self.trail[index].var().index()] {
                    break;
                }
            }
            let lit = self.trail[index];
            self.seen[lit.var().index()] = false;
            path_count -= 1;
            uip = Some(lit);
            if path_count == 0 {
                break;
            }
            match self.reason[lit.var().index()] {
                Some(r) => confl = r,
                None => break,
            }
        }
        if let Some(lit) = uip {
            learnt[0] = !lit;
        }
        for lit in &learnt[1..] {
            self.seen[lit.var().index()] = false;
        }

        let backtrack = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for i in 2..learnt.len() {
                if self.level[learnt[i].var().index()] > self.level[learnt[max_i].var().index()] {
                    max_i = i;
                }
            }
            learnt.swap(1, max_i);
            self.level[learnt[1].var().index()] as usize
        };
        (learnt, backtrack)
    }

    /// Assumptions responsible for `p` (the negation of a failed
    /// assumption) being forced
    fn analyze_final(&mut self, p: Lit) -> Vec<Lit> {
        let mut out = vec![p];
        if self.decision_level() == 0 {
            return out;
        }
        self.seen[p.var().index()] = true;
        for i in (self.trail_lim[0]..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = lit.var().index();
            if !self.seen[v] {
                continue;
            }
            match self.reason[v] {
                None => {
                    if self.level[v] > 0 {
                        out.push(!lit);
                    }
                }
                Some(r) => {
                    for k in 1..self.clauses[r as usize].len() {
                        let q = self.clauses[r as usize][k];
                        if self.level[q.var().index()] > 0 {
                            self.seen[q.var().index()] = true;
                        }
                    }
                }
            }
            self.seen[v] = false;
        }
        self.seen[p.var().index()] = false;
        out
    }

    fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let start = self.trail_lim[level];
        for i in (start..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = lit.var().index();
            self.polarity[v] = !lit.is_negated();
            self.assigns[v] = LBool::Undef;
            self.reason[v] = None;
            self.heap.insert(lit.var().0, &self.activity);
        }
        self.trail.truncate(start);
        self.trail_lim.truncate(level);
        self.qhead = self.trail.len();
    }

    fn pick_branch(&mut self) -> Option<Lit> {
        while let Some(v) = self.heap.pop(&self.activity) {
            if self.assigns[v as usize] == LBool::Undef {
                let var = Var(v);
                return Some(Lit::new(var, !self.polarity[var.index()]));
            }
        }
        None
    }

    /// Solve under `assumptions`
    pub fn solve(&mut self, assumptions: &[Lit], limits: SatLimits) -> SatOutcome {
        self.model.clear();
        if !self.ok {
            return SatOutcome::Unsat { failed: Vec::new() };
        }
        let start_conflicts = self.conflicts;
        let mut restart = 0u32;
        loop {
            let budget = luby(restart) * RESTART_BASE;
            restart += 1;
            let outcome = self.search(budget, assumptions, &limits, start_conflicts);
            if let Some(SatOutcome::Sat) = outcome {
                self.model = self
                    .assigns
                    .iter()
                    .map(|a| *a == LBool::True)
                    .collect();
            }
            self.cancel_until(0);
            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }

    fn search(
        &mut self,
        budget: u64,
        assumptions: &[Lit],
        limits: &SatLimits,
        start_conflicts: u64,
    ) -> Option<SatOutcome> {
        let mut local_conflicts = 0u64;
        loop {
            if let Some(confl) = self.propagate() {
                self.conflicts += 1;
                local_conflicts += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    return Some(SatOutcome::Unsat { failed: Vec::new() });
                }
                let (learnt, backtrack) = self.analyze(confl);
                self.cancel_until(backtrack);
                let asserting = learnt[0];
                if learnt.len() == 1 {
                    self.enqueue(asserting, None);
                } else {
                    let cref = self.attach(learnt);
                    self.enqueue(asserting, Some(cref));
                }
                self.var_inc /= VAR_DECAY;

                let used = self.conflicts - start_conflicts;
                if let Some(limit) = limits.conflict_limit {
                    if used >= limit {
                        return Some(SatOutcome::Unknown(StopReason::ConflictLimit(limit)));
                    }
                }
                if let Some(deadline) = limits.deadline {
                    if used % 32 == 0 && Instant::now() >= deadline {
                        return Some(SatOutcome::Unknown(StopReason::Deadline));
                    }
                }
            } else {
                if local_conflicts >= budget {
                    return None;
                }
                let mut next = None;
                while self.decision_level() < assumptions.len() {
                    let p = assumptions[self.decision_level()];
                    match self.value(p) {
                        LBool::True => self.trail_lim.push(self.trail.len()),
                        LBool::False => {
                            let failed = self.analyze_final(!p);
                            return Some(SatOutcome::Unsat { failed });
                        }
                        LBool::Undef => {
                            next = Some(p);
                            break;
                        }
                    }
                }
                let decision = match next {
                    Some(p) => p,
                    None => match self.pick_branch() {
                        Some(lit) => lit,
                        None => return Some(SatOutcome::Sat),
                    },
                };
                self.trail_lim.push(self.trail.len());
                self.enqueue(decision, None);
            }
        }
    }
}

/// Luby sequence 1, 1, 2, 1, 1, 2, 4, ...
fn luby(x: u32) -> u64 {
    let mut size = 1u64;
    let mut seq = 0u32;
    while size < u64::from(x) + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    let mut xx = u64::from(x);
    while size - 1 != xx {
        size = (size - 1) >> 1;
        seq -= 1;
        xx %= size;
    }
    1u64 << seq
}
