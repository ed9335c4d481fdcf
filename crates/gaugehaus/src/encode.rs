//! Label-to-code encoding for categorical request fields.
//!
//! Each categorical field owns a [`Vocabulary`] fixed at training time. A
//! label encodes to its position in the vocabulary; unknown labels are
//! rejected with the full list of accepted options so callers can surface an
//! actionable message.

use std::collections::HashMap;

/// The categorical request fields, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalField {
    City,
    PropertyType,
    Furnished,
    DeliveryTerm,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 4] = [
        CategoricalField::City,
        CategoricalField::PropertyType,
        CategoricalField::Furnished,
        CategoricalField::DeliveryTerm,
    ];

    /// Request field name, as it appears in the input schema.
    pub fn name(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::PropertyType => "property_type",
            Self::Furnished => "furnished",
            Self::DeliveryTerm => "delivery_term",
        }
    }
}

/// Construction errors for [`Vocabulary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabularyError {
    Empty,
    DuplicateLabel(String),
}

impl std::fmt::Display for VocabularyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "vocabulary has no labels"),
            Self::DuplicateLabel(label) => write!(f, "duplicate label '{}'", label),
        }
    }
}

impl std::error::Error for VocabularyError {}

/// Ordered set of category labels; a label's code is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Build from labels in code order. Labels must be unique and non-empty
    /// as a set.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(VocabularyError::Empty);
        }

        let mut index = HashMap::with_capacity(labels.len());
        for (code, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), code as u32).is_some() {
                return Err(VocabularyError::DuplicateLabel(label.clone()));
            }
        }

        Ok(Self { labels, index })
    }

    /// Code for a label, if the label is known.
    #[inline]
    pub fn code(&self, label: &str) -> Option<u32> {
        self.index.get(label).copied()
    }

    /// Label for a code, if the code is in range.
    #[inline]
    pub fn label(&self, code: u32) -> Option<&str> {
        self.labels.get(code as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in code order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A categorical value absent from its field's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory {
    /// Request field name.
    pub field: &'static str,
    /// The rejected value.
    pub value: String,
    /// Accepted labels, in code order.
    pub options: Vec<String>,
}

impl std::fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown {} '{}'; valid options: {}",
            self.field,
            self.value,
            self.options.join(", ")
        )
    }
}

impl std::error::Error for UnknownCategory {}

/// One vocabulary per categorical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEncoders {
    city: Vocabulary,
    property_type: Vocabulary,
    furnished: Vocabulary,
    delivery_term: Vocabulary,
}

impl CategoryEncoders {
    pub fn new(
        city: Vocabulary,
        property_type: Vocabulary,
        furnished: Vocabulary,
        delivery_term: Vocabulary,
    ) -> Self {
        Self {
            city,
            property_type,
            furnished,
            delivery_term,
        }
    }

    pub fn vocabulary(&self, field: CategoricalField) -> &Vocabulary {
        match field {
            CategoricalField::City => &self.city,
            CategoricalField::PropertyType => &self.property_type,
            CategoricalField::Furnished => &self.furnished,
            CategoricalField::DeliveryTerm => &self.delivery_term,
        }
    }

    /// Encode a label for a field, reporting the accepted options on failure.
    pub fn encode(&self, field: CategoricalField, value: &str) -> Result<u32, UnknownCategory> {
        let vocabulary = self.vocabulary(field);
        vocabulary.code(value).ok_or_else(|| UnknownCategory {
            field: field.name(),
            value: value.to_owned(),
            options: vocabulary.labels().to_vec(),
        })
    }
}
