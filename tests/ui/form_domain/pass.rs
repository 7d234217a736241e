use iform::form::{CastValues, FieldValue, FormDomain};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, iform::form::FormDomain)]
struct EateryFilter {
    name: String,
    radius: i64,
    max_price: Option<Decimal>,
    open_now: bool,
}

fn main() {
    assert_eq!(
        EateryFilter::field_names(),
        &["name", "radius", "max_price", "open_now"]
    );

    let filter = EateryFilter {
        name: "Taco Bus".to_string(),
        radius: 5,
        max_price: None,
        open_now: true,
    };
    let values: CastValues = filter.to_field_values();
    assert_eq!(values["radius"], FieldValue::Integer(5));
    assert_eq!(values["max_price"], FieldValue::Empty);
    assert_eq!(EateryFilter::from_cast_values(&values), Ok(filter));
}
