use std::hash::Hash;

use anyhow::Result;
use indexmap::IndexMap;

use crate::Strategy;

/// Ordered collection of every live pipeline variant at one stage of construction.
#[derive(Debug, Default)]
pub struct StrategySet {
    /// Used to keep node names of different sets distinct within one graph.
    scope: String,
    strategies: Vec<Strategy>,
}

impl StrategySet {
    /// Initialize a set with one strategy per unit of work.
    pub fn seed(scope: impl Into<String>, strategies: Vec<Strategy>) -> Self {
        Self {
            scope: scope.into(),
            strategies,
        }
    }

    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Strategy> {
        self.strategies.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&Strategy> {
        self.strategies.get(idx)
    }

    /// Labels of every strategy, in set order.
    pub fn labels(&self) -> Vec<String> {
        self.strategies.iter().map(Strategy::label).collect()
    }

    /// Apply one decision point to every strategy in the set.
    ///
    /// `options` is the list of enabled options, in declared order.
    /// `predicate` is asked, for every (strategy, option) pair, whether the option
    /// applies to that strategy; an `Err` is fatal and is raised before any
    /// strategy is touched. For each strategy, the first applicable option is
    /// applied in place, and every further applicable option is applied to a
    /// fork of the unmodified strategy. Forks are appended after all
    /// existing strategies, in (strategy, option) order.
    ///
    /// `step_fn` receives the strategy, the option, and the strategy's index
    /// in the resulting set.
    pub fn for_each_fork_if<O, P, F>(&mut self, options: &[O], predicate: P, mut step_fn: F) -> Result<()>
    where
        P: Fn(&Strategy, &O) -> Result<bool>,
        F: FnMut(&mut Strategy, &O, usize) -> Result<()>,
    {
        let mut plan: Vec<Vec<&O>> = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let mut applicable = Vec::with_capacity(options.len());
            for option in options {
                if predicate(strategy, option)? {
                    applicable.push(option);
                }
            }
            plan.push(applicable);
        }

        let len = self.strategies.len();
        let mut forks = Vec::with_capacity(0);
        for (i, applicable) in plan.into_iter().enumerate() {
            let Some((first, rest)) = applicable.split_first() else {
                continue;
            };
            // fork before the in-place branch mutates the parent:
            let branches: Vec<_> = rest.iter().map(|o| (self.strategies[i].fork(), *o)).collect();

            step_fn(&mut self.strategies[i], *first, i)?;

            for (mut fork, option) in branches {
                let idx = len + forks.len();
                step_fn(&mut fork, option, idx)?;
                log::debug!(
                    "forked strategy {i} into {idx} ({})",
                    fork.label(),
                );
                forks.push(fork);
            }
        }
        self.strategies.extend(forks);
        Ok(())
    }

    /// Group strategies by `key_fn`, keeping first-appearance order for keys
    /// and set order within each group.
    pub fn group_by<K, F>(&self, key_fn: F) -> IndexMap<K, Vec<&Strategy>>
    where
        K: Hash + Eq,
        F: Fn(&Strategy) -> K,
    {
        let mut groups: IndexMap<K, Vec<&Strategy>> = IndexMap::new();
        for strategy in &self.strategies {
            groups.entry(key_fn(strategy)).or_default().push(strategy);
        }
        groups
    }

    /// Group same-labelled strategies into families for aggregation.
    pub fn families(&self) -> Vec<Family<'_>> {
        self.group_by(Strategy::label)
            .into_iter()
            .map(|(label, strategies)| Family { label, strategies })
            .collect()
    }
}

impl<'a> IntoIterator for &'a StrategySet {
    type Item = &'a Strategy;
    type IntoIter = std::slice::Iter<'a, Strategy>;

    fn into_iter(self) -> Self::IntoIter {
        self.strategies.iter()
    }
}

/// Per-session strategies of one subject that share a label.
#[derive(Debug)]
pub struct Family<'a> {
    pub label: String,
    pub strategies: Vec<&'a Strategy>,
}

impl Family<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
