use sapwood::{
	inline,
	host::Host,
	mem::{MemoryHost, Mutation},
	node, Attrs, Child, Error, Reaction, RenderOptions, Renderer,
};
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

type H = MemoryHost;

#[test]
fn redraws_coalesce_per_frame() {
	let host = MemoryHost::new();
	let renderer = Renderer::new(host.clone());
	let body = host.body();
	let renders = Rc::new(Cell::new(0));

	let scheduler = {
		let renders = renders.clone();
		renderer
			.mount(&body, move |_| {
				renders.set(renders.get() + 1);
				Ok(renders.get().into())
			})
			.unwrap()
	};
	assert_eq!(renders.get(), 1);
	assert_eq!(host.text_content(&body), "1");

	scheduler.redraw();
	scheduler.redraw();
	assert!(scheduler.is_pending());
	assert_eq!(host.pending_frames(), 1);
	assert_eq!(host.run_frames(), 1);
	assert_eq!(renders.get(), 2);
	assert_eq!(host.text_content(&body), "2");
	assert!(!scheduler.is_pending());

	scheduler.redraw();
	scheduler.sync().unwrap();
	assert_eq!(host.pending_frames(), 0, "sync drops the pending frame");
	assert_eq!(host.text_content(&body), "3");

	scheduler.cancel().unwrap();
	assert_eq!(host.inner_html(&body), "");
	scheduler.redraw();
	assert_eq!(host.pending_frames(), 0);
	scheduler.sync().unwrap();
	assert_eq!(renders.get(), 3);
}

#[test]
fn handlers_request_redraws() {
	let host = MemoryHost::new();
	let renderer = Renderer::new(host.clone());
	let body = host.body();
	let clicks = Rc::new(Cell::new(0));
	let armed = Rc::new(Cell::new(true));

	let scheduler = {
		let clicks = clicks.clone();
		let armed = armed.clone();
		renderer
			.mount(&body, move |_| {
				let mut attrs = Attrs::<H>::new()
					.on("keydown", |_| Reaction::Skip)
					.on("input", |_| Reaction::Later(Box::pin(async { Reaction::Redraw })));
				if armed.get() {
					let clicks = clicks.clone();
					attrs = attrs.on("click", move |_| clicks.set(clicks.get() + 1));
				}
				Ok(node::<H>("button", attrs, format!("clicked {}", clicks.get()))?.into())
			})
			.unwrap()
	};
	let button = host.children(&body)[0];
	assert_eq!(host.listener_count(&button), 3);
	host.take_log();

	assert_eq!(host.dispatch(&button, "click"), 1);
	assert_eq!(clicks.get(), 1);
	assert!(scheduler.is_pending());
	host.run_frames();
	assert_eq!(host.text_content(&button), "clicked 1");
	assert!(
		!host.take_log().iter().any(|mutation| matches!(mutation, Mutation::Listen { .. } | Mutation::Unlisten { .. })),
		"swapped handlers reuse the installed listener"
	);

	host.dispatch(&button, "keydown");
	assert!(!scheduler.is_pending());

	host.dispatch(&button, "input");
	assert!(!scheduler.is_pending());
	host.run_until_stalled();
	assert!(scheduler.is_pending());
	host.run_frames();

	armed.set(false);
	scheduler.sync().unwrap();
	assert_eq!(host.listener_count(&button), 2);
	assert_eq!(host.dispatch(&button, "click"), 0);
}

#[test]
fn views_can_request_redraws() {
	let host = MemoryHost::new();
	let renderer = Renderer::new(host.clone());
	let body = host.body();
	let remaining = Rc::new(Cell::new(2));

	let _scheduler = {
		let remaining = remaining.clone();
		renderer
			.mount(&body, move |cx| {
				if remaining.get() > 0 {
					remaining.set(remaining.get() - 1);
					cx.redraw();
				}
				Ok(remaining.get().into())
			})
			.unwrap()
	};
	assert_eq!(host.text_content(&body), "1");
	host.run_frames();
	assert_eq!(host.text_content(&body), "0");
	host.run_frames();
	assert_eq!(host.pending_frames(), 0);
}

#[test]
fn overlapping_renders_are_rejected() {
	let host = MemoryHost::new();
	let renderer = Renderer::new(host.clone());
	let body = host.body();
	let elsewhere = host.create_element("div", None, None).unwrap();
	let outcome = Rc::new(RefCell::new(None));

	let view = {
		let renderer = renderer.clone();
		let outcome = outcome.clone();
		inline::<H>(move |_| {
			let options = RenderOptions::default();
			let overlapping = renderer.render(&body, "nested", &options);
			let disjoint = renderer.render(&elsewhere, "elsewhere", &options);
			*outcome.borrow_mut() = Some((matches!(overlapping, Err(Error::Locked)), disjoint.is_ok()));
			Ok(Child::Null)
		})
	};
	renderer.render(&body, view, &RenderOptions::default()).unwrap();

	assert_eq!(*outcome.borrow(), Some((true, true)));
	assert_eq!(host.text_content(&elsewhere), "elsewhere");
	renderer.render(&body, "again", &RenderOptions::default()).unwrap();
	assert_eq!(host.text_content(&body), "again");
}

#[test]
fn explicit_redraw_option() {
	let host = MemoryHost::new();
	let renderer = Renderer::new(host.clone());
	let redraws = Rc::new(Cell::new(0));
	let options = {
		let redraws = redraws.clone();
		RenderOptions::new().redraw(move || redraws.set(redraws.get() + 1))
	};

	renderer.render(&host.body(), node::<H>("button", Attrs::<H>::new().on("click", |_| ()), ()).unwrap(), &options).unwrap();
	let button = host.children(&host.body())[0];
	host.dispatch(&button, "click");
	host.dispatch(&button, "click");
	assert_eq!(redraws.get(), 2);
}
