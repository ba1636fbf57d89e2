//! Behaviour every tag model must share, independent of engine and layout.

#![allow(dead_code)]

use std::collections::BTreeSet;

use tagbench::{Error, Person, PersonData, TagModel};

pub fn tags(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Order-insensitive view of a result: names with sorted tags.
pub fn fingerprint(people: &[Person]) -> BTreeSet<(String, Vec<String>)> {
    people
        .iter()
        .map(|person| {
            let mut tags = person.tags.clone();
            tags.sort();
            (person.name.clone(), tags)
        })
        .collect()
}

pub fn names(people: &[Person]) -> BTreeSet<String> {
    people.iter().map(|person| person.name.clone()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Fresh, empty storage for `model`.
pub async fn reset(model: &dyn TagModel) {
    model.setup().await.unwrap();
    model.cleanup().await.unwrap();
    assert_eq!(model.count_persons().await.unwrap(), 0);
}

/// Small fixed population with known search answers.
pub fn crew() -> Vec<PersonData> {
    vec![
        PersonData::new("Ada", ["engineer", "remote"]),
        PersonData::new("Brook", ["engineer"]),
        PersonData::new("Cruz", ["frontend"]),
        PersonData::new("Dana", ["backend", "remote", "senior"]),
        PersonData::new("Eli", Vec::<String>::new()),
    ]
}

pub async fn check_single_tag(model: &dyn TagModel) {
    reset(model).await;

    let inserted = model
        .insert_person("Ada", &tags(&["engineer", "remote", "senior"]))
        .await
        .unwrap();
    assert_eq!(inserted.name, "Ada");
    assert_eq!(inserted.tag_set().len(), 3);

    for tag in ["engineer", "remote", "senior"] {
        let found = model.search_by_tag(tag).await.unwrap();
        assert_eq!(found.len(), 1, "tag {}", tag);
        assert_eq!(found[0].id, inserted.id);
        assert_eq!(found[0].tag_set(), inserted.tag_set());
    }
    assert!(model.search_by_tag("sales").await.unwrap().is_empty());
}

pub async fn check_duplicate_tags_on_insert(model: &dyn TagModel) {
    reset(model).await;

    let inserted = model
        .insert_person("Ada", &tags(&["qa", "qa", "remote"]))
        .await
        .unwrap();
    assert_eq!(inserted.tags, tags(&["qa", "remote"]));

    let found = model.search_by_tag("qa").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tags.len(), 2);
}

pub async fn check_and_or(model: &dyn TagModel) {
    reset(model).await;
    model.insert_persons_batch(&crew()).await.unwrap();

    let both = model
        .search_by_tags_and(&tags(&["engineer", "remote"]))
        .await
        .unwrap();
    assert_eq!(names(&both), set(&["Ada"]));

    let repeated = model
        .search_by_tags_and(&tags(&["engineer", "engineer"]))
        .await
        .unwrap();
    assert_eq!(names(&repeated), set(&["Ada", "Brook"]));

    let either = model
        .search_by_tags_or(&tags(&["frontend", "backend"]))
        .await
        .unwrap();
    assert_eq!(names(&either), set(&["Cruz", "Dana"]));

    // A person matching several requested tags appears once.
    let overlapping = model
        .search_by_tags_or(&tags(&["engineer", "remote"]))
        .await
        .unwrap();
    assert_eq!(overlapping.len(), 3);
    assert_eq!(names(&overlapping), set(&["Ada", "Brook", "Dana"]));

    let everyone = model.search_by_tags_and(&[]).await.unwrap();
    assert_eq!(everyone.len(), 5);
    assert!(model.search_by_tags_or(&[]).await.unwrap().is_empty());

    assert!(model
        .search_by_tags_and(&tags(&["engineer", "sales"]))
        .await
        .unwrap()
        .is_empty());
}

pub async fn check_batch_order(model: &dyn TagModel) {
    reset(model).await;

    let crew = crew();
    let created = model.insert_persons_batch(&crew).await.unwrap();
    assert_eq!(created.len(), crew.len());
    for (person, input) in created.iter().zip(&crew) {
        assert_eq!(person.name, input.name);
        assert_eq!(person.tags, input.tags);
    }

    let ids: Vec<i64> = created.iter().map(|p| p.id).collect();
    let stored = model.person_ids(10).await.unwrap();
    assert_eq!(stored, ids);
    assert_eq!(model.person_ids(2).await.unwrap(), ids[..2].to_vec());
    assert_eq!(model.count_persons().await.unwrap(), 5);

    assert!(model.insert_persons_batch(&[]).await.unwrap().is_empty());
    assert_eq!(model.count_persons().await.unwrap(), 5);
}

pub async fn check_cleanup(model: &dyn TagModel) {
    reset(model).await;
    model.insert_persons_batch(&crew()).await.unwrap();

    model.cleanup().await.unwrap();
    model.setup().await.unwrap();

    assert_eq!(model.count_persons().await.unwrap(), 0);
    assert!(model.search_by_tag("engineer").await.unwrap().is_empty());
    assert!(model.search_by_tags_and(&[]).await.unwrap().is_empty());

    // Cleanup on empty storage is fine.
    model.cleanup().await.unwrap();
}

pub async fn check_update_twice(model: &dyn TagModel) {
    reset(model).await;
    let person = model
        .insert_person("Ada", &tags(&["engineer", "remote"]))
        .await
        .unwrap();

    model
        .update_person_tags(person.id, &tags(&["frontend", "qa"]))
        .await
        .unwrap();
    model
        .update_person_tags(person.id, &tags(&["sales"]))
        .await
        .unwrap();

    for gone in ["engineer", "remote", "frontend", "qa"] {
        assert!(model.search_by_tag(gone).await.unwrap().is_empty(), "{}", gone);
    }
    let found = model.search_by_tag("sales").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tags, tags(&["sales"]));

    model.update_person_tags(person.id, &[]).await.unwrap();
    assert!(model.search_by_tag("sales").await.unwrap().is_empty());
    assert_eq!(model.count_persons().await.unwrap(), 1);
}

pub async fn check_update_missing_person(model: &dyn TagModel) {
    reset(model).await;
    let person = model
        .insert_person("Ada", &tags(&["engineer"]))
        .await
        .unwrap();

    let missing = person.id + 1000;
    let err = model
        .update_person_tags(missing, &tags(&["sales"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PersonNotFound(id) if id == missing));

    assert!(model.search_by_tag("sales").await.unwrap().is_empty());
    assert_eq!(model.search_by_tag("engineer").await.unwrap().len(), 1);
}

/// Run every shared check against `model`.
pub async fn check_all(model: &dyn TagModel) {
    check_single_tag(model).await;
    check_duplicate_tags_on_insert(model).await;
    check_and_or(model).await;
    check_batch_order(model).await;
    check_cleanup(model).await;
    check_update_twice(model).await;
    check_update_missing_person(model).await;
}

/// Seed `people` into every model and assert all three search shapes agree.
pub async fn check_equivalent(models: &[&dyn TagModel], people: &[PersonData]) {
    let queries = [
        tags(&["engineer"]),
        tags(&["engineer", "remote"]),
        tags(&["frontend", "backend"]),
        tags(&["qa", "senior", "devops"]),
    ];

    for model in models {
        reset(*model).await;
        model.insert_persons_batch(people).await.unwrap();
    }

    let (first, rest) = models.split_first().unwrap();
    for query in &queries {
        let single = fingerprint(&first.search_by_tag(&query[0]).await.unwrap());
        let and = fingerprint(&first.search_by_tags_and(query).await.unwrap());
        let or = fingerprint(&first.search_by_tags_or(query).await.unwrap());

        // Sanity against the input itself.
        let expected_and = people
            .iter()
            .filter(|p| query.iter().all(|t| p.tags.contains(t)))
            .count();
        assert_eq!(and.len(), expected_and, "AND {:?}", query);
        let expected_or = people
            .iter()
            .filter(|p| query.iter().any(|t| p.tags.contains(t)))
            .count();
        assert_eq!(or.len(), expected_or, "OR {:?}", query);

        for other in rest {
            let label = format!("{} {}", other.engine(), other.kind());
            assert_eq!(
                fingerprint(&other.search_by_tag(&query[0]).await.unwrap()),
                single,
                "{} single {:?}",
                label,
                query
            );
            assert_eq!(
                fingerprint(&other.search_by_tags_and(query).await.unwrap()),
                and,
                "{} AND {:?}",
                label,
                query
            );
            assert_eq!(
                fingerprint(&other.search_by_tags_or(query).await.unwrap()),
                or,
                "{} OR {:?}",
                label,
                query
            );
        }
    }
}
