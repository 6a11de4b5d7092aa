mod preemption;
