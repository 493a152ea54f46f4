use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", -n)
            } else {
                n.to_string()
            }
        }
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_comparison_term() {
        let term = SmtTerm::var("thr_0_x").ge(SmtTerm::int(-2));
        assert_eq!(to_smtlib(&term), "(>= thr_0_x (- 2))");
    }

    #[test]
    fn print_connectives() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("sel_0").eq(SmtTerm::int(1)),
            SmtTerm::or(vec![
                SmtTerm::var("act_1").eq(SmtTerm::int(0)),
                SmtTerm::var("act_1").eq(SmtTerm::int(2)),
            ]),
        ]);
        assert_eq!(
            to_smtlib(&term),
            "(and (= sel_0 1) (or (= act_1 0) (= act_1 2)))"
        );
    }

    #[test]
    fn degenerate_connectives_collapse() {
        assert_eq!(to_smtlib(&SmtTerm::and(vec![])), "true");
        assert_eq!(to_smtlib(&SmtTerm::or(vec![])), "false");
        assert_eq!(
            to_smtlib(&SmtTerm::or(vec![SmtTerm::var("a")])),
            "a"
        );
        assert_eq!(sort_to_smtlib(&SmtSort::Int), "Int");
    }
}
