//! Directive resolution
//!
//! Validates every parsed directive against the allow-lists, then applies
//! the survivors in a fixed order: filters, sorts, includes, fields and
//! appends. Registration order within a session never changes the result.

use crate::allowed::{
    AllowedAppend, AllowedField, AllowedFilter, AllowedInclude, AllowedName, AllowedSort,
    DefaultSort, Registry,
};
use crate::errors::QueryBuilderError;
use crate::request::{Directive, DirectiveKind, ParsedRequest};
use config::StrictMode;
use query_object::{Query, QueryContract, QueryError, SortOrder, ValidatedColumnRef};
use serde::Serialize;

/// Everything a session allows, one registry per directive kind
#[derive(Debug, Clone)]
pub struct AllowLists<Q: QueryContract = Query> {
    pub filters: Registry<AllowedFilter<Q>>,
    pub sorts: Registry<AllowedSort<Q>>,
    pub includes: Registry<AllowedInclude<Q>>,
    pub fields: Registry<AllowedField>,
    pub appends: Registry<AllowedAppend>,
}

impl<Q: QueryContract> Default for AllowLists<Q> {
    fn default() -> Self {
        Self {
            filters: Registry::new(),
            sorts: Registry::new(),
            includes: Registry::new(),
            fields: Registry::new(),
            appends: Registry::new(),
        }
    }
}

/// An allow-list entry that took effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDirective {
    pub kind: DirectiveKind,
    pub name: String,
    pub internal_name: String,
}

impl AppliedDirective {
    fn new(kind: DirectiveKind, name: &str, internal_name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            internal_name: internal_name.to_string(),
        }
    }
}

/// The resolved query and what went into it
#[derive(Debug, Clone)]
pub struct Resolution<Q: QueryContract = Query> {
    pub query: Q,
    pub applied: Vec<AppliedDirective>,
    /// Computed attributes to add to fetched rows, in request order
    pub appends: Vec<AllowedAppend>,
}

impl<Q: QueryContract> Resolution<Q> {
    pub fn applied_names(&self, kind: DirectiveKind) -> Vec<&str> {
        self.applied
            .iter()
            .filter(|applied| applied.kind == kind)
            .map(|applied| applied.name.as_str())
            .collect()
    }
}

pub fn resolve<Q: QueryContract>(
    query: Q,
    request: &ParsedRequest,
    allowed: &AllowLists<Q>,
    default_sorts: &[DefaultSort],
    strict: &StrictMode,
) -> Result<Resolution<Q>, QueryBuilderError> {
    reject_unknown(request, allowed, strict)?;

    let mut resolution = Resolution {
        query,
        applied: Vec::new(),
        appends: Vec::new(),
    };

    apply_filters(&mut resolution, request, &allowed.filters)?;
    apply_sorts(&mut resolution, request, &allowed.sorts, default_sorts)?;

    let fields = requested_fields(request, &allowed.fields)?;
    apply_includes(&mut resolution, request, &allowed.includes, &fields)?;
    apply_fields(&mut resolution, &fields);

    for directive in &request.appends {
        if let Some(append) = allowed.appends.resolve(&directive.name) {
            resolution.appends.push(append.clone());
            resolution.applied.push(AppliedDirective::new(
                DirectiveKind::Append,
                &append.name,
                &append.name,
            ));
        }
    }

    debug_log!(
        "[RESOLVE] {} directive(s) applied to {}",
        resolution.applied.len(),
        resolution.query.table_name()
    );
    Ok(resolution)
}

/// Every unknown name of every kind, reported together
fn reject_unknown<Q: QueryContract>(
    request: &ParsedRequest,
    allowed: &AllowLists<Q>,
    strict: &StrictMode,
) -> Result<(), QueryBuilderError> {
    let mut errors = Vec::new();

    check_kind(
        DirectiveKind::Filter,
        &request.filters,
        &allowed.filters,
        strict.filters,
        &mut errors,
    );
    check_kind(DirectiveKind::Sort, &request.sorts, &allowed.sorts, strict.sorts, &mut errors);
    check_kind(
        DirectiveKind::Include,
        &request.includes,
        &allowed.includes,
        strict.includes,
        &mut errors,
    );
    check_kind(DirectiveKind::Field, &request.fields, &allowed.fields, strict.fields, &mut errors);
    check_kind(
        DirectiveKind::Append,
        &request.appends,
        &allowed.appends,
        strict.appends,
        &mut errors,
    );

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(QueryBuilderError::InvalidDirectives(errors)),
    }
}

fn check_kind<T: AllowedName>(
    kind: DirectiveKind,
    directives: &[Directive],
    registry: &Registry<T>,
    strict: bool,
    errors: &mut Vec<QueryBuilderError>,
) {
    let unknown: Vec<String> = directives
        .iter()
        .filter(|directive| registry.resolve(&directive.name).is_none())
        .map(|directive| directive.name.clone())
        .collect();

    if unknown.is_empty() {
        return;
    }

    if !strict {
        debug_log!("[RESOLVE] Ignoring unknown {}(s): {}", kind, unknown.join(", "));
        return;
    }

    let allowed = registry.names();
    errors.push(match kind {
        DirectiveKind::Filter => QueryBuilderError::InvalidFilterQuery { unknown, allowed },
        DirectiveKind::Sort => QueryBuilderError::InvalidSortQuery { unknown, allowed },
        DirectiveKind::Include => QueryBuilderError::InvalidIncludeQuery { unknown, allowed },
        DirectiveKind::Field => QueryBuilderError::InvalidFieldQuery { unknown, allowed },
        DirectiveKind::Append => QueryBuilderError::InvalidAppendQuery { unknown, allowed },
    });
}

fn validate_column(reference: &str) -> Result<(), QueryBuilderError> {
    ValidatedColumnRef::new(reference).map_err(QueryError::from)?;
    Ok(())
}

fn apply_filters<Q: QueryContract>(
    resolution: &mut Resolution<Q>,
    request: &ParsedRequest,
    filters: &Registry<AllowedFilter<Q>>,
) -> Result<(), QueryBuilderError> {
    for filter in filters.iter() {
        let requested = request
            .filter(&filter.name)
            .map(|directive| directive.value.as_ref().unwrap_or(&serde_json::Value::Null));
        let Some(value) = filter.effective_value(requested) else {
            continue;
        };

        if filter.strategy.targets_column() {
            validate_column(&filter.internal_name)?;
        }

        trace_log!(
            "[RESOLVE] filter `{}` ({:?}) on {}",
            filter.name,
            filter.strategy,
            filter.internal_name
        );
        let query = resolution.query.clone();
        resolution.query = filter.strategy.apply(query, &value, &filter.internal_name)?;
        resolution.applied.push(AppliedDirective::new(
            DirectiveKind::Filter,
            &filter.name,
            &filter.internal_name,
        ));
    }
    Ok(())
}

fn apply_sorts<Q: QueryContract>(
    resolution: &mut Resolution<Q>,
    request: &ParsedRequest,
    sorts: &Registry<AllowedSort<Q>>,
    default_sorts: &[DefaultSort],
) -> Result<(), QueryBuilderError> {
    let mut sorted = false;

    for directive in &request.sorts {
        let Some(sort) = sorts.resolve(&directive.name) else {
            continue;
        };
        apply_sort(resolution, sort, directive.descending)?;
        sorted = true;
    }

    if sorted {
        return Ok(());
    }

    for default in default_sorts {
        match sorts.resolve(&default.name) {
            Some(sort) => apply_sort(resolution, sort, default.descending)?,
            None => {
                validate_column(&default.name)?;
                let query = resolution.query.clone();
                resolution.query =
                    query.order_by(&default.name, SortOrder::from_descending(default.descending));
                resolution.applied.push(AppliedDirective::new(
                    DirectiveKind::Sort,
                    &default.name,
                    &default.name,
                ));
            }
        }
    }
    Ok(())
}

fn apply_sort<Q: QueryContract>(
    resolution: &mut Resolution<Q>,
    sort: &AllowedSort<Q>,
    descending: bool,
) -> Result<(), QueryBuilderError> {
    if sort.strategy.targets_column() {
        validate_column(&sort.internal_name)?;
    }

    let query = resolution.query.clone();
    resolution.query = sort.strategy.apply(query, descending, &sort.internal_name)?;
    resolution.applied.push(AppliedDirective::new(
        DirectiveKind::Sort,
        &sort.name,
        &sort.internal_name,
    ));
    Ok(())
}

/// Allowed field directives, checked as identifiers
fn requested_fields<'a>(
    request: &ParsedRequest,
    fields: &'a Registry<AllowedField>,
) -> Result<Vec<&'a AllowedField>, QueryBuilderError> {
    let mut resolved = Vec::new();
    for directive in &request.fields {
        if let Some(field) = fields.resolve(&directive.name) {
            validate_column(&field.internal_name)?;
            resolved.push(field);
        }
    }
    Ok(resolved)
}

fn apply_includes<Q: QueryContract>(
    resolution: &mut Resolution<Q>,
    request: &ParsedRequest,
    includes: &Registry<AllowedInclude<Q>>,
    fields: &[&AllowedField],
) -> Result<(), QueryBuilderError> {
    for include in includes.iter() {
        if !request.includes.iter().any(|directive| directive.name == include.name) {
            continue;
        }

        let columns: Vec<String> = fields
            .iter()
            .filter(|field| field.owner() == Some(include.name.as_str()))
            .map(|field| field.column().to_string())
            .collect();

        trace_log!(
            "[RESOLVE] include `{}` ({:?}) as {}",
            include.name,
            include.strategy,
            include.internal_name
        );
        let query = resolution.query.clone();
        resolution.query = include.strategy.apply(query, &include.internal_name, &columns)?;
        resolution.applied.push(AppliedDirective::new(
            DirectiveKind::Include,
            &include.name,
            &include.internal_name,
        ));
    }
    Ok(())
}

fn apply_fields<Q: QueryContract>(resolution: &mut Resolution<Q>, fields: &[&AllowedField]) {
    let columns: Vec<String> = fields
        .iter()
        .filter(|field| field.owner().is_none())
        .map(|field| field.internal_name.clone())
        .collect();

    for field in fields {
        resolution.applied.push(AppliedDirective::new(
            DirectiveKind::Field,
            &field.name,
            &field.internal_name,
        ));
    }

    if !columns.is_empty() {
        let query = resolution.query.clone();
        resolution.query = query.select(columns);
    }
}
