use std::collections::{BTreeMap, HashMap};

use crate::model::member::Member;

/// Display names that tell members with the same name apart.
///
/// A unique name is shown as is. Members sharing a name get their cell's
/// name appended when that alone separates them, otherwise their position
/// among the namesakes ordered by id: `Grace Kim (Joshua)`, `Grace Kim (2)`.
pub fn disambiguate_names(
    members: &[Member],
    cell_names: &HashMap<u64, String>,
) -> HashMap<u64, String> {
    let mut by_name: BTreeMap<&str, Vec<&Member>> = BTreeMap::new();
    for member in members {
        by_name.entry(member.name.trim()).or_default().push(member);
    }

    let mut names = HashMap::with_capacity(members.len());
    for (name, mut group) in by_name {
        group.sort_by_key(|m| m.id);
        group.dedup_by_key(|m| m.id);

        if group.len() == 1 {
            names.insert(group[0].id, name.to_string());
            continue;
        }

        let cells: Vec<Option<&String>> = group
            .iter()
            .map(|m| m.cell_id.and_then(|id| cell_names.get(&id)))
            .collect();
        let cells_distinct = cells.iter().all(Option::is_some)
            && cells
                .iter()
                .enumerate()
                .all(|(i, cell)| !cells[..i].contains(cell));

        for (position, member) in group.iter().enumerate() {
            let label = match cells[position] {
                Some(cell) if cells_distinct => format!("{name} ({cell})"),
                _ => format!("{name} ({})", position + 1),
            };
            names.insert(member.id, label);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64, name: &str, cell_id: Option<u64>) -> Member {
        Member {
            id,
            name: name.to_string(),
            phone: None,
            birth_date: None,
            cell_id,
            cell_assignment_date: None,
        }
    }

    fn cells() -> HashMap<u64, String> {
        HashMap::from([(1, "Joshua".to_string()), (2, "Caleb".to_string())])
    }

    #[test]
    fn unique_names_are_untouched() {
        let members = vec![member(1, "Grace Kim", Some(1)), member(2, " Daniel Lee ", None)];
        let names = disambiguate_names(&members, &cells());
        assert_eq!(names[&1], "Grace Kim");
        assert_eq!(names[&2], "Daniel Lee");
    }

    #[test]
    fn namesakes_in_different_cells_get_cell_name() {
        let members = vec![member(5, "Grace Kim", Some(2)), member(3, "Grace Kim", Some(1))];
        let names = disambiguate_names(&members, &cells());
        assert_eq!(names[&3], "Grace Kim (Joshua)");
        assert_eq!(names[&5], "Grace Kim (Caleb)");
    }

    #[test]
    fn namesakes_in_same_cell_get_position() {
        let members = vec![
            member(9, "Grace Kim", Some(1)),
            member(4, "Grace Kim", Some(1)),
            member(6, "Esther Park", Some(1)),
        ];
        let names = disambiguate_names(&members, &cells());
        assert_eq!(names[&4], "Grace Kim (1)");
        assert_eq!(names[&9], "Grace Kim (2)");
        assert_eq!(names[&6], "Esther Park");
    }

    #[test]
    fn unassigned_namesake_falls_back_to_position() {
        let members = vec![member(1, "Grace Kim", Some(1)), member(2, "Grace Kim", None)];
        let names = disambiguate_names(&members, &cells());
        assert_eq!(names[&1], "Grace Kim (1)");
        assert_eq!(names[&2], "Grace Kim (2)");
    }
}
