//! Typed column filters and their compilation to SQL conditions.
//!
//! Every `XWhere` struct of the models is built out of these pieces. A filter
//! with no field set matches everything; all set fields are AND-ed.

use std::collections::BTreeSet;

use sea_orm::{
    ColumnTrait, Value,
    sea_query::{Alias, Condition, Expr, Func, LikeExpr, Query, SimpleExpr},
};

use super::resource::{Resource, WhereInput};

/// Equality, membership, range and null tests on a column of type `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarFilter<T> {
    pub equals: Option<T>,
    pub not: Option<T>,
    pub in_list: Option<Vec<T>>,
    pub not_in: Option<Vec<T>>,
    pub lt: Option<T>,
    pub lte: Option<T>,
    pub gt: Option<T>,
    pub gte: Option<T>,
    /// `Some(true)` matches NULL, `Some(false)` matches NOT NULL.
    pub is_null: Option<bool>,
}

impl<T> Default for ScalarFilter<T> {
    fn default() -> Self {
        Self {
            equals: None,
            not: None,
            in_list: None,
            not_in: None,
            lt: None,
            lte: None,
            gt: None,
            gte: None,
            is_null: None,
        }
    }
}

impl<T> ScalarFilter<T> {
    pub fn equals(value: T) -> Self {
        Self {
            equals: Some(value),
            ..Self::default()
        }
    }

    pub fn not(value: T) -> Self {
        Self {
            not: Some(value),
            ..Self::default()
        }
    }

    pub fn in_list(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            in_list: Some(values.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn not_in(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            not_in: Some(values.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn lt(value: T) -> Self {
        Self {
            lt: Some(value),
            ..Self::default()
        }
    }

    pub fn lte(value: T) -> Self {
        Self {
            lte: Some(value),
            ..Self::default()
        }
    }

    pub fn gt(value: T) -> Self {
        Self {
            gt: Some(value),
            ..Self::default()
        }
    }

    pub fn gte(value: T) -> Self {
        Self {
            gte: Some(value),
            ..Self::default()
        }
    }

    /// Inclusive range `[low, high]`.
    pub fn between(low: T, high: T) -> Self {
        Self {
            gte: Some(low),
            lte: Some(high),
            ..Self::default()
        }
    }

    pub fn null() -> Self {
        Self {
            is_null: Some(true),
            ..Self::default()
        }
    }

    pub fn not_null() -> Self {
        Self {
            is_null: Some(false),
            ..Self::default()
        }
    }

    /// Every operand the filter compares against.
    fn values(&self) -> impl Iterator<Item = &T> {
        self.equals
            .iter()
            .chain(&self.not)
            .chain(self.in_list.iter().flatten())
            .chain(self.not_in.iter().flatten())
            .chain(&self.lt)
            .chain(&self.lte)
            .chain(&self.gt)
            .chain(&self.gte)
    }
}

impl<T> ScalarFilter<T>
where
    T: Clone + Into<Value>,
{
    pub(crate) fn condition(&self, target: &SimpleExpr) -> Condition {
        let on = || Expr::expr(target.clone());
        let mut cond = Condition::all();
        if let Some(value) = &self.equals {
            cond = cond.add(on().eq(value.clone()));
        }
        if let Some(value) = &self.not {
            cond = cond.add(on().ne(value.clone()));
        }
        if let Some(values) = &self.in_list {
            cond = cond.add(on().is_in(values.iter().cloned()));
        }
        if let Some(values) = &self.not_in {
            cond = cond.add(on().is_not_in(values.iter().cloned()));
        }
        if let Some(value) = &self.lt {
            cond = cond.add(on().lt(value.clone()));
        }
        if let Some(value) = &self.lte {
            cond = cond.add(on().lte(value.clone()));
        }
        if let Some(value) = &self.gt {
            cond = cond.add(on().gt(value.clone()));
        }
        if let Some(value) = &self.gte {
            cond = cond.add(on().gte(value.clone()));
        }
        match self.is_null {
            Some(true) => cond = cond.add(on().is_null()),
            Some(false) => cond = cond.add(on().is_not_null()),
            None => {}
        }
        cond
    }

    pub(crate) fn map(&self, f: impl Fn(&T) -> T) -> Self {
        Self {
            equals: self.equals.as_ref().map(&f),
            not: self.not.as_ref().map(&f),
            in_list: self.in_list.as_ref().map(|v| v.iter().map(&f).collect()),
            not_in: self.not_in.as_ref().map(|v| v.iter().map(&f).collect()),
            lt: self.lt.as_ref().map(&f),
            lte: self.lte.as_ref().map(&f),
            gt: self.gt.as_ref().map(&f),
            gte: self.gte.as_ref().map(&f),
            is_null: self.is_null,
        }
    }
}

pub type IntFilter = ScalarFilter<i64>;
pub type BoolFilter = ScalarFilter<bool>;
pub type DateTimeFilter = ScalarFilter<sea_orm::prelude::DateTimeUtc>;

/// How string comparisons treat letter case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// Filter on a text column.
///
/// `contains`, `starts_with` and `ends_with` escape `%`, `_` and `!` so the
/// needle is matched literally.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringFilter {
    pub scalar: ScalarFilter<String>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub mode: QueryMode,
}

impl StringFilter {
    pub fn equals(value: impl Into<String>) -> Self {
        ScalarFilter::equals(value.into()).into()
    }

    pub fn not(value: impl Into<String>) -> Self {
        ScalarFilter::not(value.into()).into()
    }

    pub fn in_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScalarFilter::in_list(values.into_iter().map(Into::into)).into()
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        Self {
            contains: Some(needle.into()),
            ..Self::default()
        }
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self {
            starts_with: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self {
            ends_with: Some(suffix.into()),
            ..Self::default()
        }
    }

    pub fn null() -> Self {
        ScalarFilter::null().into()
    }

    pub fn not_null() -> Self {
        ScalarFilter::not_null().into()
    }

    /// Compare case-insensitively: the input is lowercased and the column is
    /// folded the same way in SQL.
    #[must_use]
    pub fn insensitive(mut self) -> Self {
        self.mode = QueryMode::Insensitive;
        self
    }

    pub(crate) fn condition(&self, target: &SimpleExpr) -> Condition {
        let lowered;
        let (filter, target) = match self.mode {
            QueryMode::Default => (self, target.clone()),
            QueryMode::Insensitive => {
                lowered = self.lowercased();
                let target = fold_case(target, lowered.needles());
                (&lowered, target)
            }
        };

        let mut cond = filter.scalar.condition(&target);
        let like = |pattern: String| {
            Expr::expr(target.clone()).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
        };
        if let Some(needle) = &filter.contains {
            cond = cond.add(like(format!("%{}%", escape_like(needle))));
        }
        if let Some(prefix) = &filter.starts_with {
            cond = cond.add(like(format!("{}%", escape_like(prefix))));
        }
        if let Some(suffix) = &filter.ends_with {
            cond = cond.add(like(format!("%{}", escape_like(suffix))));
        }
        cond
    }

    fn lowercased(&self) -> Self {
        let lower = |s: &Option<String>| s.as_deref().map(str::to_lowercase);
        Self {
            scalar: self.scalar.map(|s| s.to_lowercase()),
            contains: lower(&self.contains),
            starts_with: lower(&self.starts_with),
            ends_with: lower(&self.ends_with),
            mode: self.mode,
        }
    }

    fn needles(&self) -> impl Iterator<Item = &str> {
        self.scalar
            .values()
            .map(String::as_str)
            .chain(self.contains.as_deref())
            .chain(self.starts_with.as_deref())
            .chain(self.ends_with.as_deref())
    }
}

/// `LOWER(target)` with the uppercase forms of the non-ASCII letters found in
/// `needles` replaced by their lowercase form first.
///
/// SQLite's `LOWER` only folds ASCII. Only one-to-one case mappings are
/// handled (`Đ`/`đ`, `É`/`é`), not expansions such as `ß`/`SS`.
fn fold_case<'s>(target: &SimpleExpr, needles: impl Iterator<Item = &'s str>) -> SimpleExpr {
    let letters: BTreeSet<char> = needles
        .flat_map(str::chars)
        .filter(|c| !c.is_ascii())
        .collect();

    let mut folded = target.clone();
    for lower in letters {
        let mut upper = lower.to_uppercase();
        let (Some(upper), None) = (upper.next(), upper.next()) else {
            continue;
        };
        if upper == lower {
            continue;
        }
        folded = Func::cust(Alias::new("REPLACE"))
            .args([
                folded,
                SimpleExpr::Value(Value::from(upper.to_string())),
                SimpleExpr::Value(Value::from(lower.to_string())),
            ])
            .into();
    }
    Func::lower(folded).into()
}

impl From<ScalarFilter<String>> for StringFilter {
    fn from(scalar: ScalarFilter<String>) -> Self {
        Self {
            scalar,
            ..Self::default()
        }
    }
}

// Not a backslash: string literal escaping of `\` differs between backends.
const LIKE_ESCAPE: char = '!';

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Filter on a to-one relation.
#[derive(Clone, Debug, PartialEq)]
pub enum RelationFilter<W> {
    /// The related row exists and matches.
    Is(Box<W>),
    /// The related row does not match (or there is none).
    IsNot(Box<W>),
    /// No related row (only meaningful on nullable foreign keys).
    Absent,
    Present,
}

impl<W> RelationFilter<W> {
    pub fn is(filter: W) -> Self {
        Self::Is(Box::new(filter))
    }

    pub fn is_not(filter: W) -> Self {
        Self::IsNot(Box::new(filter))
    }
}

/// Filter on a to-many relation.
#[derive(Clone, Debug, PartialEq)]
pub enum ManyFilter<W> {
    /// At least one related row matches.
    Some(Box<W>),
    /// All related rows match (vacuously true without related rows).
    Every(Box<W>),
    /// No related row matches.
    None(Box<W>),
}

impl<W> ManyFilter<W> {
    pub fn some(filter: W) -> Self {
        Self::Some(Box::new(filter))
    }

    pub fn every(filter: W) -> Self {
        Self::Every(Box::new(filter))
    }

    pub fn none(filter: W) -> Self {
        Self::None(Box::new(filter))
    }
}

/// Accumulates the condition of a `XWhere` struct field by field.
pub(crate) struct WhereBuilder {
    cond: Condition,
}

impl WhereBuilder {
    pub(crate) fn new() -> Self {
        Self {
            cond: Condition::all(),
        }
    }

    pub(crate) fn scalar<C, T>(mut self, column: C, filter: &Option<ScalarFilter<T>>) -> Self
    where
        C: ColumnTrait,
        T: Clone + Into<Value>,
    {
        if let Some(filter) = filter {
            self.cond = self.cond.add(filter.condition(&Expr::col(column).into()));
        }
        self
    }

    pub(crate) fn string<C>(mut self, column: C, filter: &Option<StringFilter>) -> Self
    where
        C: ColumnTrait,
    {
        if let Some(filter) = filter {
            self.cond = self.cond.add(filter.condition(&Expr::col(column).into()));
        }
        self
    }

    /// `fk IN (SELECT id FROM parent WHERE …)`.
    pub(crate) fn to_one<P, C>(mut self, fk: C, filter: &Option<RelationFilter<P::Where>>) -> Self
    where
        P: Resource,
        C: ColumnTrait,
    {
        let Some(filter) = filter else {
            return self;
        };
        let parents = |w: &P::Where| {
            Query::select()
                .column(P::primary_column())
                .from(P::default())
                .cond_where(w.condition())
                .to_owned()
        };
        let cond = match filter {
            RelationFilter::Is(w) => Condition::all().add(Expr::col(fk).in_subquery(parents(w))),
            RelationFilter::IsNot(w) => Condition::any()
                .add(Expr::col(fk).not_in_subquery(parents(w)))
                .add(Expr::col(fk).is_null()),
            RelationFilter::Absent => Condition::all().add(Expr::col(fk).is_null()),
            RelationFilter::Present => Condition::all().add(Expr::col(fk).is_not_null()),
        };
        self.cond = self.cond.add(cond);
        self
    }

    /// `id [NOT] IN (SELECT fk FROM child WHERE …)`.
    pub(crate) fn to_many<Ch, C>(
        mut self,
        pk: C,
        fk: Ch::Column,
        filter: &Option<ManyFilter<Ch::Where>>,
    ) -> Self
    where
        Ch: Resource,
        C: ColumnTrait,
    {
        let Some(filter) = filter else {
            return self;
        };
        let children = |cond: Condition| {
            Query::select()
                .column(fk)
                .from(Ch::default())
                .cond_where(Condition::all().add(Expr::col(fk).is_not_null()).add(cond))
                .to_owned()
        };
        let cond = match filter {
            ManyFilter::Some(w) => Expr::col(pk).in_subquery(children(w.condition())),
            ManyFilter::None(w) => Expr::col(pk).not_in_subquery(children(w.condition())),
            ManyFilter::Every(w) => {
                if w.is_empty() {
                    return self;
                }
                Expr::col(pk).not_in_subquery(children(w.condition().not()))
            }
        };
        self.cond = self.cond.add(cond);
        self
    }

    pub(crate) fn logical<W: WhereInput>(mut self, and: &[W], or: &[W], not: &[W]) -> Self {
        for w in and {
            self.cond = self.cond.add(w.condition());
        }
        if !or.is_empty() {
            let any = or
                .iter()
                .fold(Condition::any(), |acc, w| acc.add(w.condition()));
            self.cond = self.cond.add(any);
        }
        for w in not {
            self.cond = self.cond.add(w.condition().not());
        }
        self
    }

    pub(crate) fn build(self) -> Condition {
        self.cond
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_needles_are_escaped() {
        assert_eq!(escape_like("50%_off!"), "50!%!_off!!");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn empty_filters_are_default() {
        assert_eq!(IntFilter::default(), ScalarFilter::<i64>::default());
        assert!(StringFilter::default().contains.is_none());
        let f = IntFilter::between(1, 5);
        assert_eq!((f.gte, f.lte), (Some(1), Some(5)));
    }
}
