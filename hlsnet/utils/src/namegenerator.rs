use std::collections::{HashMap, HashSet};

/// Simple HashMap-based name generator that generates new names for each
/// prefix.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    name_hash: HashMap<String, i64>,
    generated_names: HashSet<String>,
}

impl NameGenerator {
    /// Record a name which was created outside of the generator.
    pub fn add_name<S: Into<String>>(&mut self, name: S) {
        self.generated_names.insert(name.into());
    }

    /// Returns a new String that starts with `prefix`.
    /// For example:
    /// ```
    /// # let mut namegen = hlsnet_utils::NameGenerator::default();
    /// assert_eq!(namegen.gen_name("busy_n"), "busy_n");
    /// assert_eq!(namegen.gen_name("busy_n"), "busy_n0");
    /// ```
    pub fn gen_name<S: Into<String>>(&mut self, prefix: S) -> String {
        let mut cur_prefix: String = prefix.into();
        loop {
            // Insert default value for this prefix if there is no entry.
            let count = self
                .name_hash
                .entry(cur_prefix.clone())
                .and_modify(|v| *v += 1)
                .or_insert(-1);

            let name = if *count == -1 {
                cur_prefix.clone()
            } else {
                format!("{cur_prefix}{count}")
            };

            // If we've not generated this name before, return it.
            if self.generated_names.insert(name.clone()) {
                return name;
            }

            // If the name was generated before, use the current name as the
            // prefix.
            cur_prefix = name;
        }
    }
}
