//! The rule table: pattern-based template dispatch with import precedence,
//! priority, and document-order tie-breaking.

use crate::ast::{StylesheetModule, TemplateDef};
use crate::pattern::PathPattern;
use salix_xpath::DataSourceNode;
use std::collections::HashMap;

/// One dispatchable rule. A template with a union pattern contributes one
/// rule per alternative, each with its own default priority.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: PathPattern,
    pub mode: Option<String>,
    pub priority: f64,
    /// Position of the defining stylesheet in the flattened import
    /// sequence: 0 is the principal, larger ranks lose precedence.
    pub import_rank: usize,
    /// Position of the template within its module, in document order.
    pub doc_order: usize,
    /// Index into the composed template arena.
    pub template: usize,
    /// The pattern's source text, for diagnostics.
    pub pattern_text: String,
}

/// The frozen dispatch table, one rule pool per mode. Derived data: rebuilt
/// wholesale by [`compose`], never mutated in place.
#[derive(Debug, Default)]
pub struct RuleTable {
    by_mode: HashMap<Option<String>, Vec<Rule>>,
}

impl RuleTable {
    fn insert(&mut self, rule: Rule) {
        self.by_mode.entry(rule.mode.clone()).or_default().push(rule);
    }

    /// Picks the winning rule for `node` in `mode`: the matching rule with
    /// the highest import precedence, then the highest priority, then the
    /// latest document order. Rules that tie on all three are ambiguous;
    /// the pick stays deterministic and a warning is logged.
    pub fn best_rule<'a, N: DataSourceNode<'a>>(
        &self,
        mode: Option<&str>,
        node: N,
        root: N,
    ) -> Option<&Rule> {
        let key = mode.map(str::to_string);
        let pool = self.by_mode.get(&key)?;

        let mut best: Option<&Rule> = None;
        let mut ambiguous_with: Option<&Rule> = None;
        for rule in pool {
            if !rule.pattern.matches(node, root) {
                continue;
            }
            match best {
                None => best = Some(rule),
                Some(current) => {
                    if rule_outranks(rule, current) {
                        best = Some(rule);
                        ambiguous_with = None;
                    } else if rules_tie(rule, current) && rule.template != current.template {
                        ambiguous_with = Some(rule);
                    }
                }
            }
        }
        if let (Some(winner), Some(loser)) = (best, ambiguous_with) {
            log::warn!(
                "ambiguous rule match: patterns '{}' and '{}' tie on precedence, priority and document order; picking '{}'",
                winner.pattern_text,
                loser.pattern_text,
                winner.pattern_text
            );
        }
        best
    }

    pub fn modes(&self) -> impl Iterator<Item = Option<&str>> {
        self.by_mode.keys().map(|k| k.as_deref())
    }

    pub fn len(&self) -> usize {
        self.by_mode.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn rule_outranks(candidate: &Rule, current: &Rule) -> bool {
    (
        std::cmp::Reverse(candidate.import_rank),
        candidate.priority,
        candidate.doc_order,
    ) > (
        std::cmp::Reverse(current.import_rank),
        current.priority,
        current.doc_order,
    )
}

fn rules_tie(a: &Rule, b: &Rule) -> bool {
    a.import_rank == b.import_rank && a.priority == b.priority && a.doc_order == b.doc_order
}

/// Flattens the import tree into precedence order: the principal first,
/// every import strictly after its importer, sibling imports in declaration
/// order.
pub fn flatten_modules(root: &StylesheetModule) -> Vec<&StylesheetModule> {
    let mut out = Vec::new();
    fn walk<'m>(module: &'m StylesheetModule, out: &mut Vec<&'m StylesheetModule>) {
        out.push(module);
        for import in &module.imports {
            walk(import, out);
        }
    }
    walk(root, &mut out);
    out
}

/// The output of rule composition: the dispatch table plus the flattened
/// template arena it indexes into.
#[derive(Debug, Default)]
pub struct Composition {
    pub table: RuleTable,
    pub templates: Vec<TemplateDef>,
    /// Name to arena index; on a name clash the higher-precedence
    /// definition wins.
    pub named_templates: HashMap<String, usize>,
}

/// Builds the rule table for a fully parsed import/include closure.
/// Deterministic and idempotent: composing the same module tree twice
/// yields tables that select identical winners.
pub fn compose(root: &StylesheetModule) -> Composition {
    let mut composition = Composition::default();
    for (rank, module) in flatten_modules(root).iter().enumerate() {
        for (doc_order, template) in module.templates.iter().enumerate() {
            let index = composition.templates.len();
            if let Some(name) = &template.name {
                composition
                    .named_templates
                    .entry(name.clone())
                    .or_insert(index);
            }
            if let Some(pattern) = &template.match_pattern {
                for alternative in &pattern.alternatives {
                    composition.table.insert(Rule {
                        pattern: alternative.clone(),
                        mode: template.mode.clone(),
                        priority: template
                            .priority
                            .unwrap_or_else(|| alternative.default_priority()),
                        import_rank: rank,
                        doc_order,
                        template: index,
                        pattern_text: pattern.text().to_string(),
                    });
                }
            }
            composition.templates.push(template.clone());
        }
    }
    composition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TemplateBody;
    use crate::pattern::Pattern;
    use salix_xpath::tests::sample_tree;

    fn template(
        match_text: Option<&str>,
        name: Option<&str>,
        priority: Option<f64>,
        mode: Option<&str>,
    ) -> TemplateDef {
        TemplateDef {
            name: name.map(str::to_string),
            match_pattern: match_text.map(|t| Pattern::parse(t).unwrap()),
            mode: mode.map(str::to_string),
            priority,
            params: vec![],
            body: TemplateBody::default(),
        }
    }

    fn module(templates: Vec<TemplateDef>) -> StylesheetModule {
        StylesheetModule {
            templates,
            ..StylesheetModule::default()
        }
    }

    #[test]
    fn explicit_priority_beats_default() {
        // Two templates match 'item'; the one with explicit priority 1
        // beats the name test's default of 0.
        let root = module(vec![
            template(Some("item"), None, Some(1.0), None),
            template(Some("item"), None, None, None),
        ]);
        let composition = compose(&root);
        let tree = sample_tree();
        let rule = composition
            .table
            .best_rule(None, tree.node(3), tree.node(0))
            .unwrap();
        assert_eq!(rule.template, 0);
    }

    #[test]
    fn name_test_beats_wildcard() {
        let root = module(vec![
            template(Some("*"), None, None, None),
            template(Some("item"), None, None, None),
        ]);
        let composition = compose(&root);
        let tree = sample_tree();
        let rule = composition
            .table
            .best_rule(None, tree.node(3), tree.node(0))
            .unwrap();
        assert_eq!(rule.template, 1);
    }

    #[test]
    fn last_in_document_order_wins_ties() {
        let root = module(vec![
            template(Some("item"), None, None, None),
            template(Some("item"), None, None, None),
            template(Some("item"), None, None, None),
        ]);
        let composition = compose(&root);
        let tree = sample_tree();
        // Repeated queries stay deterministic.
        for _ in 0..3 {
            let rule = composition
                .table
                .best_rule(None, tree.node(3), tree.node(0))
                .unwrap();
            assert_eq!(rule.template, 2);
        }
    }

    #[test]
    fn precedence_beats_priority() {
        // The imported module defines a high-priority rule for 'item'; the
        // principal's low-priority rule still wins.
        let imported = module(vec![template(Some("item"), None, Some(5.0), None)]);
        let mut principal = module(vec![template(Some("item"), None, Some(1.0), None)]);
        principal.imports.push(imported);

        let composition = compose(&principal);
        let tree = sample_tree();
        let rule = composition
            .table
            .best_rule(None, tree.node(3), tree.node(0))
            .unwrap();
        assert_eq!(rule.import_rank, 0);
        assert_eq!(rule.template, 0);
    }

    #[test]
    fn imported_rules_apply_when_nothing_closer_matches() {
        let imported = module(vec![template(Some("note"), None, None, None)]);
        let mut principal = module(vec![template(Some("item"), None, None, None)]);
        principal.imports.push(imported);

        let composition = compose(&principal);
        let tree = sample_tree();
        let rule = composition
            .table
            .best_rule(None, tree.node(7), tree.node(0))
            .unwrap();
        assert_eq!(rule.import_rank, 1);
    }

    #[test]
    fn modes_partition_the_rule_space() {
        let root = module(vec![
            template(Some("item"), None, None, None),
            template(Some("item"), None, None, Some("toc")),
        ]);
        let composition = compose(&root);
        let tree = sample_tree();

        let plain = composition
            .table
            .best_rule(None, tree.node(3), tree.node(0))
            .unwrap();
        assert_eq!(plain.template, 0);

        let toc = composition
            .table
            .best_rule(Some("toc"), tree.node(3), tree.node(0))
            .unwrap();
        assert_eq!(toc.template, 1);

        assert!(
            composition
                .table
                .best_rule(Some("missing"), tree.node(3), tree.node(0))
                .is_none()
        );
    }

    #[test]
    fn union_patterns_expand_per_alternative() {
        let root = module(vec![template(Some("item|note"), None, None, None)]);
        let composition = compose(&root);
        assert_eq!(composition.table.len(), 2);

        let tree = sample_tree();
        assert!(
            composition
                .table
                .best_rule(None, tree.node(7), tree.node(0))
                .is_some()
        );
    }

    #[test]
    fn named_templates_prefer_higher_precedence() {
        let imported = module(vec![template(None, Some("header"), None, None)]);
        let mut principal = module(vec![template(None, Some("header"), None, None)]);
        principal.imports.push(imported);

        let composition = compose(&principal);
        assert_eq!(composition.named_templates["header"], 0);
    }

    #[test]
    fn recomposition_is_idempotent() {
        let imported = module(vec![template(Some("item"), None, Some(5.0), None)]);
        let mut principal = module(vec![
            template(Some("item"), None, None, None),
            template(Some("*"), None, None, None),
        ]);
        principal.imports.push(imported);

        let first = compose(&principal);
        let second = compose(&principal);
        let tree = sample_tree();
        for id in [1, 3, 5, 7] {
            let a = first.table.best_rule(None, tree.node(id), tree.node(0));
            let b = second.table.best_rule(None, tree.node(id), tree.node(0));
            assert_eq!(a.map(|r| r.template), b.map(|r| r.template));
        }
    }
}
