use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use super::engine::MapError;
use super::schema::FormSchema;
use super::state::FieldValues;
use super::value::{CastValues, FieldValue, FormDomain, Record};

/// Translates between the caller's domain object and the flat value map of a
/// form.
///
/// `domain_to_form` must produce exactly the schema's field set; the reducer
/// checks this when the form is opened.
pub trait DomainMapper: Send + Sync + 'static {
    type Domain: Clone + Debug + Send + Sync + 'static;

    fn domain_to_form(&self, schema: &FormSchema, domain: &Self::Domain) -> FieldValues;
    fn form_to_domain(&self, values: &CastValues) -> Result<Self::Domain, MapError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StraightMapper;

impl DomainMapper for StraightMapper {
    type Domain = Record;

    fn domain_to_form(&self, schema: &FormSchema, domain: &Record) -> FieldValues {
        straight_domain_to_form(schema, domain)
    }

    fn form_to_domain(&self, values: &CastValues) -> Result<Record, MapError> {
        Ok(values.clone())
    }
}

fn straight_domain_to_form(schema: &FormSchema, domain: &Record) -> FieldValues {
    schema
        .fields()
        .iter()
        .map(|field| {
            let raw = domain
                .get(field.name())
                .map(FieldValue::to_raw)
                .unwrap_or_default();
            (field.name().to_string(), raw)
        })
        .collect()
}

pub struct DerivedMapper<D> {
    _domain: PhantomData<fn() -> D>,
}

impl<D> DerivedMapper<D> {
    pub fn new() -> Self {
        Self {
            _domain: PhantomData,
        }
    }
}

impl<D> Default for DerivedMapper<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DomainMapper for DerivedMapper<D>
where
    D: FormDomain + Debug,
{
    type Domain = D;

    fn domain_to_form(&self, _schema: &FormSchema, domain: &D) -> FieldValues {
        domain
            .to_field_values()
            .into_iter()
            .map(|(name, value)| (name, value.to_raw()))
            .collect()
    }

    fn form_to_domain(&self, values: &CastValues) -> Result<D, MapError> {
        D::from_cast_values(values)
    }
}

type DomainToFormFn<D> = Arc<dyn Fn(&FormSchema, &D) -> FieldValues + Send + Sync>;
type FormToDomainFn<D> = Arc<dyn Fn(&CastValues) -> Result<D, MapError> + Send + Sync>;

pub struct FnMapper<D> {
    domain_to_form: DomainToFormFn<D>,
    form_to_domain: FormToDomainFn<D>,
}

impl<D> FnMapper<D> {
    pub fn new(
        domain_to_form: impl Fn(&FormSchema, &D) -> FieldValues + Send + Sync + 'static,
        form_to_domain: impl Fn(&CastValues) -> Result<D, MapError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            domain_to_form: Arc::new(domain_to_form),
            form_to_domain: Arc::new(form_to_domain),
        }
    }

    pub fn with_domain_to_form(
        mut self,
        f: impl Fn(&FormSchema, &D) -> FieldValues + Send + Sync + 'static,
    ) -> Self {
        self.domain_to_form = Arc::new(f);
        self
    }

    pub fn with_form_to_domain(
        mut self,
        f: impl Fn(&CastValues) -> Result<D, MapError> + Send + Sync + 'static,
    ) -> Self {
        self.form_to_domain = Arc::new(f);
        self
    }
}

impl FnMapper<Record> {
    pub fn straight() -> Self {
        Self::new(straight_domain_to_form, |values| Ok(values.clone()))
    }
}

impl<D> DomainMapper for FnMapper<D>
where
    D: Clone + Debug + Send + Sync + 'static,
{
    type Domain = D;

    fn domain_to_form(&self, schema: &FormSchema, domain: &D) -> FieldValues {
        (self.domain_to_form)(schema, domain)
    }

    fn form_to_domain(&self, values: &CastValues) -> Result<D, MapError> {
        (self.form_to_domain)(values)
    }
}
