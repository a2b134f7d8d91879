use serde::{Deserialize, Serialize};

/// Row position of a customer within its source file (1-based, header excluded).
///
/// Identity is positional: the same row number in two different files
/// addresses the same stored customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub i64);

impl CustomerId {
    pub fn from_row_number(row_number: usize) -> Self {
        Self(i64::try_from(row_number).unwrap_or(i64::MAX))
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone_1: Option<String>,
    pub phone_2: Option<String>,
    pub email: Option<String>,
    pub subscription_date: Option<String>,
    pub website: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: CustomerId,
    pub profile: CustomerProfile,
}

impl CustomerProfile {
    /// Maps fields by position: 0 first name, 1 last name, 2 company, 3 city,
    /// 4 country, 5 phone 1, 6 phone 2, 7 email, 8 subscription date, 9 website.
    /// Missing positions stay `None`; positions past 9 are ignored.
    pub fn from_positional<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut slots: [Option<String>; 10] = Default::default();
        for (slot, value) in slots.iter_mut().zip(fields) {
            *slot = Some(value.to_owned());
        }

        let [first_name, last_name, company, city, country, phone_1, phone_2, email, subscription_date, website] =
            slots;

        Self {
            first_name,
            last_name,
            company,
            city,
            country,
            phone_1,
            phone_2,
            email,
            subscription_date,
            website,
        }
    }
}
