use std::fmt;

/// Row window appended after ORDER BY
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn with_limit(self, limit: i64) -> Self {
        Self { limit: Some(limit), ..self }
    }

    pub fn with_offset(self, offset: i64) -> Self {
        Self { offset: Some(offset), ..self }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }
}

impl fmt::Display for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limit = self.limit.map(|n| format!("LIMIT {}", n));
        let offset = self.offset.map(|n| format!("OFFSET {}", n));
        let parts: Vec<String> = limit.into_iter().chain(offset).collect();
        f.write_str(&parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rendering() {
        assert!(Pagination::default().is_unbounded());
        assert_eq!(Pagination::default().to_string(), "");
        assert_eq!(Pagination::default().with_offset(40).to_string(), "OFFSET 40");
        assert_eq!(
            Pagination::default().with_offset(40).with_limit(20).to_string(),
            "LIMIT 20 OFFSET 40"
        );
    }
}
