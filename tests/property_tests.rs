use narrator_core::{PriorityInbox, WorkItem};
use proptest::prelude::*;

fn drain_order(priorities: &[i64]) -> Vec<(i64, usize)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async {
        let inbox = PriorityInbox::new(priorities.len());
        for (index, priority) in priorities.iter().enumerate() {
            inbox
                .submit(WorkItem::new(index.to_string(), None).with_priority(*priority))
                .await
                .unwrap();
        }

        let mut order = Vec::with_capacity(priorities.len());
        for _ in 0..priorities.len() {
            let item = inbox.next().await.unwrap();
            order.push((item.priority, item.user_message().parse().unwrap()));
        }
        order
    })
}

proptest! {
    #[test]
    fn test_inbox_orders_by_priority_then_arrival(
        priorities in prop::collection::vec(-5i64..5i64, 1..60)
    ) {
        let order = drain_order(&priorities);

        // Every submitted item comes out exactly once
        let mut indices: Vec<usize> = order.iter().map(|(_, index)| *index).collect();
        indices.sort_unstable();
        prop_assert_eq!(indices, (0..priorities.len()).collect::<Vec<_>>());

        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(a.0 <= b.0, "priority went backwards: {:?} then {:?}", a, b);
            if a.0 == b.0 {
                prop_assert!(a.1 < b.1, "tie not in arrival order: {:?} then {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_inbox_never_exceeds_capacity(
        capacity in 1usize..8,
        extra in 1usize..8
    ) {
        let inbox = PriorityInbox::new(capacity);
        let mut accepted = 0;
        for i in 0..capacity + extra {
            if inbox.try_submit(WorkItem::new(i.to_string(), None)).is_ok() {
                accepted += 1;
            }
            prop_assert!(inbox.len() <= capacity);
        }
        prop_assert_eq!(accepted, capacity);
    }
}
