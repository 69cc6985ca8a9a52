use super::*;

#[tokio::test]
async fn every_subscriber_receives_each_signal() {
    let bus = SignalBus::default();
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();

    let delivered = bus.emit(&EventId::new("E"), SignalKind::SectionsLoaded);
    assert_eq!(delivered, 2);

    let expected = ScheduleSignal::new(EventId::new("E"), SignalKind::SectionsLoaded);
    assert_eq!(first.recv().await.expect("first"), expected);
    assert_eq!(second.recv().await.expect("second"), expected);
}

#[test]
fn publishing_without_subscribers_is_harmless() {
    let bus = SignalBus::new(4);
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(bus.emit(&EventId::new("E"), SignalKind::SessionsLoaded), 0);
}
