//! Request types shared by every search index backend
use rental_common::RentableListing;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Gte, // field:>=value
    Lte, // field:<=value
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Operator::Gte => ">=",
            Operator::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericFilter {
    pub field: &'static str,
    pub operator: Operator,
    pub value: f64,
}

impl NumericFilter {
    pub fn new(field: &'static str, operator: Operator, value: f64) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    /// Typesense `filter_by` clause, e.g. `pricePerDay:>=50`.
    pub fn to_clause(&self) -> String {
        format!("{}:{}{}", self.field, self.operator.symbol(), self.value)
    }

    pub fn matches(&self, listing: &RentableListing) -> bool {
        let Some(actual) = numeric_field(listing, self.field) else {
            return false;
        };
        match self.operator {
            Operator::Gte => actual >= self.value,
            Operator::Lte => actual <= self.value,
        }
    }
}

fn numeric_field(listing: &RentableListing, field: &str) -> Option<f64> {
    match field {
        "pricePerDay" => Some(listing.price_per_day),
        "availableQuantity" => Some(listing.available_quantity as f64),
        _ => None,
    }
}

/// One index query: free text over `query_by` AND every numeric filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Trimmed search text; empty means match-all.
    pub text: String,
    pub query_by: &'static [&'static str],
    pub filters: Vec<NumericFilter>,
}

impl SearchParams {
    /// Value for the Typesense `q` parameter.
    pub fn q(&self) -> &str {
        if self.text.is_empty() {
            "*"
        } else {
            &self.text
        }
    }

    pub fn query_by_param(&self) -> String {
        self.query_by.join(",")
    }

    pub fn filter_by(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }
        let clauses: Vec<String> = self.filters.iter().map(NumericFilter::to_clause).collect();
        Some(clauses.join(" && "))
    }

    pub fn matches_filters(&self, listing: &RentableListing) -> bool {
        self.filters.iter().all(|f| f.matches(listing))
    }
}
