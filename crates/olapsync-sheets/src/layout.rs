//! Sheet layouts: which headers feed which fields.
//!
//! Headers are free text maintained by hand, so columns are located by
//! substring rules rather than exact names. Rules are checked in declared
//! order and the first rule matching a header claims it. When two headers
//! match the same role, the leftmost one is used.

use std::fmt;

use olapsync_core::SheetsConfig;

/// What a column contributes to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Date,
    Department,
    Measure(&'static str),
}

/// A header rule: the role applies when every needle of any alternative is a
/// substring of the lower-cased header.
struct HeaderRule {
    role: Role,
    any_of: &'static [&'static [&'static str]],
}

const DATE_RULE: HeaderRule = HeaderRule {
    role: Role::Date,
    any_of: &[&["дата"]],
};

const DEPARTMENT_RULE: HeaderRule = HeaderRule {
    role: Role::Department,
    any_of: &[&["торгов"], &["предприят"], &["филиал"]],
};

const DIRECT_RULES: &[HeaderRule] = &[
    DATE_RULE,
    HeaderRule {
        role: Role::Measure("ad_budget"),
        any_of: &[&["реклам"], &["бюджет"]],
    },
    HeaderRule {
        role: Role::Measure("fot_direct"),
        any_of: &[&["фот", "директ"]],
    },
    DEPARTMENT_RULE,
];

const FOT_RULES: &[HeaderRule] = &[
    DATE_RULE,
    HeaderRule {
        role: Role::Measure("fot_couriers"),
        any_of: &[&["курьер", "фот"]],
    },
    HeaderRule {
        role: Role::Measure("fot_cooks"),
        any_of: &[&["повар", "фот"]],
    },
    HeaderRule {
        role: Role::Measure("fot_cleaners"),
        any_of: &[&["уборщиц", "фот"]],
    },
    DEPARTMENT_RULE,
];

/// The two spreadsheet families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SheetKind {
    /// Advertising budget and direct payroll.
    Direct,
    /// Payroll by staff category.
    Fot,
}

impl SheetKind {
    pub const ALL: [SheetKind; 2] = [SheetKind::Direct, SheetKind::Fot];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SheetKind::Direct => "sheets-direct",
            SheetKind::Fot => "sheets-fot",
        }
    }

    /// Fields this sheet produces, in rule order.
    #[must_use]
    pub fn measures(self) -> Vec<&'static str> {
        self.rules()
            .iter()
            .filter_map(|r| match r.role {
                Role::Measure(field) => Some(field),
                _ => None,
            })
            .collect()
    }

    /// `(sheet URL or id, range)` for this kind.
    #[must_use]
    pub fn source(self, config: &SheetsConfig) -> (&str, &str) {
        match self {
            SheetKind::Direct => (config.direct_url.as_str(), config.direct_range.as_str()),
            SheetKind::Fot => (config.fot_url.as_str(), config.fot_range.as_str()),
        }
    }

    fn rules(self) -> &'static [HeaderRule] {
        match self {
            SheetKind::Direct => DIRECT_RULES,
            SheetKind::Fot => FOT_RULES,
        }
    }

    /// Classifies a single header, already trimmed and lower-cased.
    #[must_use]
    pub fn classify(self, header: &str) -> Option<Role> {
        self.rules()
            .iter()
            .find(|rule| {
                rule.any_of
                    .iter()
                    .any(|needles| needles.iter().all(|n| header.contains(n)))
            })
            .map(|rule| rule.role)
    }

    /// Resolves a header row into column positions.
    #[must_use]
    pub fn resolve(self, headers: &[String]) -> ColumnMap {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            match self.classify(header) {
                Some(Role::Date) if map.date.is_none() => map.date = Some(idx),
                Some(Role::Department) if map.department.is_none() => {
                    map.department = Some(idx);
                }
                Some(Role::Measure(field)) if !map.measures.iter().any(|(f, _)| *f == field) => {
                    map.measures.push((field, idx));
                }
                _ => {}
            }
        }
        map
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column positions found in a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: Option<usize>,
    pub department: Option<usize>,
    pub measures: Vec<(&'static str, usize)>,
}

/// Trims and lower-cases a raw header cell.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|h| normalize_header(h)).collect()
    }

    #[test]
    fn direct_headers_resolve() {
        let map = SheetKind::Direct.resolve(&headers(&[
            " Дата ",
            "Рекламный бюджет",
            "ФОТ Директ",
            "Торговое предприятие",
        ]));
        assert_eq!(map.date, Some(0));
        assert_eq!(map.department, Some(3));
        assert_eq!(map.measures, vec![("ad_budget", 1), ("fot_direct", 2)]);
    }

    #[test]
    fn fot_headers_need_both_needles() {
        assert_eq!(SheetKind::Fot.classify("курьеры"), None);
        assert_eq!(
            SheetKind::Fot.classify("фот курьеры"),
            Some(Role::Measure("fot_couriers"))
        );
        assert_eq!(
            SheetKind::Fot.classify("фот уборщицы"),
            Some(Role::Measure("fot_cleaners"))
        );
    }

    #[test]
    fn date_rule_wins_over_later_rules() {
        assert_eq!(SheetKind::Direct.classify("дата бюджета"), Some(Role::Date));
    }

    #[test]
    fn leftmost_header_wins_a_role() {
        let map = SheetKind::Fot.resolve(&headers(&["Дата", "Дата оплаты", "Филиал"]));
        assert_eq!(map.date, Some(0));
        assert_eq!(map.department, Some(2));
    }

    #[test]
    fn measures_follow_rule_order() {
        assert_eq!(SheetKind::Direct.measures(), vec!["ad_budget", "fot_direct"]);
        assert_eq!(
            SheetKind::Fot.measures(),
            vec!["fot_couriers", "fot_cooks", "fot_cleaners"]
        );
    }
}
